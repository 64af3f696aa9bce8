//! Linearizations of the inviscid face flux with respect to the conserved
//! variables, used to assemble the implicit system.

use faer::Mat;

use crate::{eos::IdealGas, state::Primitive, vector::Vector3};

/// Exact Jacobian `∂(F·n)/∂U` of the inviscid flux of an ideal gas.
pub fn flux_jacobian(eos: &IdealGas, w: &Primitive, n: Vector3) -> Mat<f64> {
    let g1 = eos.gamma() - 1.0;
    let u = w.vel;
    let vn = u.dot(n);
    let phi = 0.5 * g1 * u.mag_sq();
    let h = w.enthalpy(eos);
    let (uu, nn) = (u.to_array(), n.to_array());

    Mat::from_fn(5, 5, |row, col| match (row, col) {
        (0, 0) | (0, 4) => 0.0,
        (0, c) => nn[c - 1],
        (4, 0) => vn * (phi - h),
        (4, 4) => eos.gamma() * vn,
        (4, c) => h * nn[c - 1] - g1 * uu[c - 1] * vn,
        (r, 0) => nn[r - 1] * phi - uu[r - 1] * vn,
        (r, 4) => g1 * nn[r - 1],
        (r, c) => {
            let (i, j) = (r - 1, c - 1);
            let diag = if i == j { vn } else { 0.0 };
            diag + uu[i] * nn[j] - g1 * uu[j] * nn[i]
        }
    })
}

/// Approximate Jacobians of the numerical flux with respect to the left
/// and right states: `½(A(U_L) + λI)` and `½(A(U_R) − λI)`, with `λ` the
/// larger spectral radius of the two states.
pub fn split_jacobians(
    eos: &IdealGas,
    left: &Primitive,
    right: &Primitive,
    n: Vector3,
) -> (Mat<f64>, Mat<f64>) {
    let lambda = left
        .spectral_radius(eos, n)
        .max(right.spectral_radius(eos, n));
    let al = flux_jacobian(eos, left, n);
    let ar = flux_jacobian(eos, right, n);
    let dl = Mat::from_fn(5, 5, |i, j| {
        0.5 * (al[(i, j)] + if i == j { lambda } else { 0.0 })
    });
    let dr = Mat::from_fn(5, 5, |i, j| {
        0.5 * (ar[(i, j)] - if i == j { lambda } else { 0.0 })
    });
    (dl, dr)
}

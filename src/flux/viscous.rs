use std::ops::{Add, Mul};

use crate::{state::StateVector, vector::Vector3};

/// Gradients of the velocity components and of the temperature.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Gradients {
    pub u: Vector3,
    pub v: Vector3,
    pub w: Vector3,
    pub t: Vector3,
}

impl Gradients {
    /// Contribution `φ_f A_f` of a face to a Green-Gauss surface integral.
    pub fn from_face(vel: Vector3, t: f64, area: Vector3) -> Self {
        Self {
            u: vel.x * area,
            v: vel.y * area,
            w: vel.z * area,
            t: t * area,
        }
    }

    /// Replaces the component of every gradient along `d` with the
    /// difference quotient of the values `from` and `to` taken at the two
    /// ends of `d`.
    pub fn along(self, from: (Vector3, f64), to: (Vector3, f64), d: Vector3) -> Self {
        let len = d.mag();
        let e = d / len;
        let fix = |g: Vector3, a: f64, b: f64| g + ((b - a) / len - g.dot(e)) * e;
        Self {
            u: fix(self.u, from.0.x, to.0.x),
            v: fix(self.v, from.0.y, to.0.y),
            w: fix(self.w, from.0.z, to.0.z),
            t: fix(self.t, from.1, to.1),
        }
    }

    /// Velocity gradient tensor `L[i][j] = ∂u_i/∂x_j`.
    pub fn velocity_tensor(&self) -> [[f64; 3]; 3] {
        [self.u.to_array(), self.v.to_array(), self.w.to_array()]
    }

    pub fn divergence(&self) -> f64 {
        self.u.x + self.v.y + self.w.z
    }
}

impl Add for Gradients {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            u: self.u + rhs.u,
            v: self.v + rhs.v,
            w: self.w + rhs.w,
            t: self.t + rhs.t,
        }
    }
}

impl Mul<f64> for Gradients {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self {
            u: self.u * rhs,
            v: self.v * rhs,
            w: self.w * rhs,
            t: self.t * rhs,
        }
    }
}

/// Diffusive flux through a face with area vector `area`, for a Newtonian
/// fluid under Stokes' hypothesis and Fourier heat conduction.
///
/// `mu` and `conductivity` are already scaled for the nondimensional
/// equations.
pub fn viscous_flux(
    mu: f64,
    conductivity: f64,
    vel: Vector3,
    grad: &Gradients,
    area: Vector3,
) -> StateVector {
    let l = grad.velocity_tensor();
    let a = area.to_array();
    let bulk = 2.0 / 3.0 * mu * grad.divergence();

    let mut tau_n = [0.0; 3];
    for (i, t) in tau_n.iter_mut().enumerate() {
        *t = (0..3)
            .map(|j| mu * (l[i][j] + l[j][i]) * a[j])
            .sum::<f64>()
            - bulk * a[i];
    }
    let tau_n = Vector3::from_array(tau_n);

    [
        0.0,
        tau_n.x,
        tau_n.y,
        tau_n.z,
        tau_n.dot(vel) + conductivity * grad.t.dot(area),
    ]
}

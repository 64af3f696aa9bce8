//! Roe's approximate Riemann solver with Harten's entropy fix.
//!
//! The flux is `½(F_L + F_R) − ½ Σ |λ_k| α_k r_k`, written in the
//! face-normal form of Blazek, "Computational Fluid Dynamics: Principles
//! and Applications", §4.3.3.

use crate::{
    eos::IdealGas,
    flux::{inviscid_flux, NumericalFlux},
    state::{Primitive, StateVector},
    vector::Vector3,
};

/// Width of the entropy fix, as a fraction of the Roe-averaged speed of sound.
pub const ENTROPY_FIX: f64 = 0.1;

#[inline]
fn harten(lambda: f64, delta: f64) -> f64 {
    let abs = lambda.abs();
    if abs < delta {
        (lambda * lambda + delta * delta) / (2.0 * delta)
    } else {
        abs
    }
}

/// Roe-averaged state of a face.
#[derive(Debug, Clone, Copy)]
pub struct RoeAverage {
    pub rho: f64,
    pub vel: Vector3,
    pub enthalpy: f64,
    pub sound_speed: f64,
}

impl RoeAverage {
    pub fn new(eos: &IdealGas, left: &Primitive, right: &Primitive) -> Self {
        let sl = left.rho.sqrt();
        let sr = right.rho.sqrt();
        let w = 1.0 / (sl + sr);
        let vel = w * (sl * left.vel + sr * right.vel);
        let enthalpy = w * (sl * left.enthalpy(eos) + sr * right.enthalpy(eos));
        let sound_speed = ((eos.gamma() - 1.0) * (enthalpy - 0.5 * vel.mag_sq())).sqrt();
        Self {
            rho: sl * sr,
            vel,
            enthalpy,
            sound_speed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Roe;

impl NumericalFlux for Roe {
    fn flux(&self, eos: &IdealGas, left: &Primitive, right: &Primitive, n: Vector3) -> StateVector {
        let fl = inviscid_flux(eos, left, n);
        let fr = inviscid_flux(eos, right, n);

        let RoeAverage {
            rho,
            vel: u,
            enthalpy: h,
            sound_speed: a,
        } = RoeAverage::new(eos, left, right);
        let vn = u.dot(n);

        let dp = right.p - left.p;
        let drho = right.rho - left.rho;
        let dvel = right.vel - left.vel;
        let dvn = dvel.dot(n);

        let delta = ENTROPY_FIX * a;
        let a2 = a * a;

        // acoustic waves
        let s1 = harten(vn - a, delta) * (dp - rho * a * dvn) / (2.0 * a2);
        let s5 = harten(vn + a, delta) * (dp + rho * a * dvn) / (2.0 * a2);
        // entropy and shear waves
        let s2 = vn.abs() * (drho - dp / a2);
        let s3 = vn.abs() * rho;
        let shear = dvel - dvn * n;

        let minus = u - a * n;
        let plus = u + a * n;
        let diss = [
            s1 + s2 + s5,
            s1 * minus.x + s2 * u.x + s3 * shear.x + s5 * plus.x,
            s1 * minus.y + s2 * u.y + s3 * shear.y + s5 * plus.y,
            s1 * minus.z + s2 * u.z + s3 * shear.z + s5 * plus.z,
            s1 * (h - a * vn)
                + s2 * 0.5 * u.mag_sq()
                + s3 * (u.dot(dvel) - vn * dvn)
                + s5 * (h + a * vn),
        ];

        let mut f = [0.0; 5];
        for e in 0..5 {
            f[e] = 0.5 * (fl[e] + fr[e] - diss[e]);
        }
        f
    }

    fn name(&self) -> &'static str {
        "Roe"
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn eos() -> IdealGas {
        IdealGas::nondimensional(1.4)
    }

    #[test]
    fn supersonic_flow_is_fully_upwinded() {
        let eos = eos();
        let n = Vector3::new(1.0, 0.0, 0.0);
        let l = Primitive::new(1.0, Vector3::new(2.5, 0.1, 0.0), 0.7);
        let r = Primitive::new(0.8, Vector3::new(2.2, 0.0, 0.1), 0.6);
        let f = Roe.flux(&eos, &l, &r, n);
        let exact = inviscid_flux(&eos, &l, n);
        for (a, b) in f.iter().zip(&exact) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn stationary_contact_is_preserved() {
        // a density jump at constant pressure, at rest, produces no mass flux
        let eos = eos();
        let n = Vector3::new(0.0, 0.0, 1.0);
        let l = Primitive::new(1.0, Vector3::ZERO, 0.7);
        let r = Primitive::new(0.3, Vector3::ZERO, 0.7);
        let f = Roe.flux(&eos, &l, &r, n);
        assert_relative_eq!(f[0], 0.0, epsilon = 1e-15);
        assert_relative_eq!(f[3], 0.7, epsilon = 1e-14);
        assert_relative_eq!(f[4], 0.0, epsilon = 1e-15);
    }

    #[test]
    fn mirror_states_carry_no_mass_or_energy() {
        let eos = eos();
        let n = Vector3::new(0.0, 1.0, 0.0);
        let l = Primitive::new(1.1, Vector3::new(0.3, 0.4, -0.1), 0.9);
        let r = l.reflected(n);
        let f = Roe.flux(&eos, &l, &r, n);
        assert_relative_eq!(f[0], 0.0, epsilon = 1e-15);
        assert_relative_eq!(f[4], 0.0, epsilon = 1e-14);
        assert_relative_eq!(f[1], 0.0, epsilon = 1e-15);
        assert!(f[2] > l.p);
    }

    #[test]
    fn flux_is_continuous_in_the_states() {
        let eos = eos();
        let n = Vector3::new(0.6, 0.0, 0.8);
        let l = Primitive::new(1.0, Vector3::new(0.4, 0.0, 0.2), 0.71);
        let r = Primitive::new(0.9, Vector3::new(0.3, 0.1, 0.2), 0.66);
        let f = Roe.flux(&eos, &l, &r, n);
        let eps = 1e-7;
        let r2 = Primitive::new(r.rho + eps, r.vel, r.p + eps);
        let g = Roe.flux(&eos, &l, &r2, n);
        for (a, b) in f.iter().zip(&g) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}

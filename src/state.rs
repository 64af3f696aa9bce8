use crate::{eos::IdealGas, vector::Vector3};

/// Number of conservation equations: mass, three momenta, energy.
pub const NUM_EQNS: usize = 5;

/// A conserved vector `{ρ, ρu, ρv, ρw, ρE}`, or a flux/residual of one.
pub type StateVector = [f64; NUM_EQNS];

pub const ZERO_STATE: StateVector = [0.0; NUM_EQNS];

/// `y += a * x`, componentwise.
#[inline]
pub fn axpy(y: &mut StateVector, a: f64, x: &StateVector) {
    for (y, x) in y.iter_mut().zip(x) {
        *y += a * x;
    }
}

/// Primitive variables of a single cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primitive {
    pub rho: f64,
    pub vel: Vector3,
    pub p: f64,
}

impl Primitive {
    pub fn new(rho: f64, vel: Vector3, p: f64) -> Self {
        Self { rho, vel, p }
    }

    /// The reference state in nondimensional variables, moving with `vel`
    /// (already scaled by the reference speed of sound).
    pub fn free_stream(eos: &IdealGas, vel: Vector3) -> Self {
        Self::new(1.0, vel, 1.0 / eos.gamma())
    }

    pub fn from_conserved(u: &StateVector, eos: &IdealGas) -> Self {
        let rho = u[0];
        let vel = Vector3::new(u[1], u[2], u[3]) / rho;
        let internal = u[4] / rho - 0.5 * vel.mag_sq();
        Self::new(rho, vel, eos.pressure(rho, internal))
    }

    pub fn to_conserved(&self, eos: &IdealGas) -> StateVector {
        let m = self.rho * self.vel;
        [
            self.rho,
            m.x,
            m.y,
            m.z,
            self.rho * eos.energy(self.p, self.rho, self.vel.mag_sq()),
        ]
    }

    #[inline]
    pub fn temperature(&self, eos: &IdealGas) -> f64 {
        eos.temperature(self.p, self.rho)
    }

    #[inline]
    pub fn sound_speed(&self, eos: &IdealGas) -> f64 {
        eos.sound_speed(self.p, self.rho)
    }

    #[inline]
    pub fn enthalpy(&self, eos: &IdealGas) -> f64 {
        eos.enthalpy(self.p, self.rho, self.vel.mag_sq())
    }

    pub fn is_physical(&self) -> bool {
        self.rho > 0.0 && self.p > 0.0
    }

    /// Same state with the velocity component along the unit normal `n` reversed.
    pub fn reflected(&self, n: Vector3) -> Self {
        Self::new(self.rho, self.vel - 2.0 * self.vel.dot(n) * n, self.p)
    }

    /// Convective spectral radius `|u·n| + a` along a unit normal.
    #[inline]
    pub fn spectral_radius(&self, eos: &IdealGas, n: Vector3) -> f64 {
        self.vel.dot(n).abs() + self.sound_speed(eos)
    }

    /// Componentwise mean of two states, used for face values.
    pub fn average(&self, other: &Self) -> Self {
        Self::new(
            0.5 * (self.rho + other.rho),
            0.5 * (self.vel + other.vel),
            0.5 * (self.p + other.p),
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn conserved_round_trip() {
        let eos = IdealGas::nondimensional(1.4);
        let w = Primitive::new(1.3, Vector3::new(0.2, -0.4, 0.1), 0.9);
        let back = Primitive::from_conserved(&w.to_conserved(&eos), &eos);
        assert_relative_eq!(back.rho, w.rho, max_relative = 1e-14);
        assert_relative_eq!(back.p, w.p, max_relative = 1e-14);
        assert_relative_eq!((back.vel - w.vel).mag(), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn free_stream_has_unit_sound_speed() {
        let eos = IdealGas::nondimensional(1.4);
        let w = Primitive::free_stream(&eos, Vector3::new(0.5, 0.0, 0.0));
        assert_relative_eq!(w.sound_speed(&eos), 1.0, max_relative = 1e-15);
        assert_relative_eq!(w.temperature(&eos), 1.0, max_relative = 1e-15);
    }

    #[test]
    fn reflection_flips_normal_velocity_only() {
        let w = Primitive::new(1.0, Vector3::new(1.0, 2.0, 3.0), 1.0);
        let r = w.reflected(Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(r.vel, Vector3::new(1.0, -2.0, 3.0));
        assert!(!Primitive::new(1.0, Vector3::ZERO, -1.0).is_physical());
    }
}

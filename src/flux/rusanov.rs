use crate::{
    eos::IdealGas,
    flux::{inviscid_flux, NumericalFlux},
    state::{Primitive, StateVector},
    vector::Vector3,
};

/// Local Lax-Friedrichs flux, dissipating with the largest wave speed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rusanov;

impl NumericalFlux for Rusanov {
    fn flux(&self, eos: &IdealGas, left: &Primitive, right: &Primitive, n: Vector3) -> StateVector {
        let fl = inviscid_flux(eos, left, n);
        let fr = inviscid_flux(eos, right, n);
        let ul = left.to_conserved(eos);
        let ur = right.to_conserved(eos);
        let lambda = left
            .spectral_radius(eos, n)
            .max(right.spectral_radius(eos, n));

        let mut f = [0.0; 5];
        for e in 0..5 {
            f[e] = 0.5 * (fl[e] + fr[e] - lambda * (ur[e] - ul[e]));
        }
        f
    }

    fn name(&self) -> &'static str {
        "Rusanov"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dissipates_density_jumps() {
        let eos = IdealGas::nondimensional(1.4);
        let l = Primitive::new(1.0, Vector3::ZERO, 1.0);
        let r = Primitive::new(0.5, Vector3::ZERO, 1.0);
        let f = Rusanov.flux(&eos, &l, &r, Vector3::new(1.0, 0.0, 0.0));
        // mass flows from the dense side
        assert!(f[0] > 0.0);
    }
}

use core::fmt;

use serde::Deserialize;

use crate::{
    eos::IdealGas,
    flux::inviscid_flux,
    state::{Primitive, StateVector, NUM_EQNS},
    transport::Sutherland,
    vector::Vector3,
};

/// Constant Prandtl number of air.
pub const PRANDTL: f64 = 0.72;

/// The compressible flow equations in conservation form,
/// `U_t + ∇·(F_inv − F_visc) = 0`.
pub trait ConservationLaw {
    fn system_size(&self) -> usize {
        NUM_EQNS
    }

    fn inviscid_flux(&self, eos: &IdealGas, w: &Primitive, n: Vector3) -> StateVector {
        inviscid_flux(eos, w, n)
    }

    /// Diffusive terms, if the equations carry any.
    fn viscous(&self) -> Option<&NavierStokes>;

    fn name(&self) -> &'static str;
}

/// Viscous closure of the Navier-Stokes equations in nondimensional form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavierStokes {
    transport: Sutherland,
    prandtl: f64,
    // M_ref / Re_ref
    scale: f64,
}

impl NavierStokes {
    pub fn new(transport: Sutherland, mach: f64, reynolds: f64) -> Self {
        Self {
            transport,
            prandtl: PRANDTL,
            scale: mach / reynolds,
        }
    }

    pub fn transport(&self) -> &Sutherland {
        &self.transport
    }

    pub fn prandtl(&self) -> f64 {
        self.prandtl
    }

    /// Effective viscosity at nondimensional temperature `t`, including the
    /// `M/Re` scaling of the diffusive terms.
    #[inline]
    pub fn viscosity(&self, t: f64) -> f64 {
        self.scale * self.transport.viscosity(t)
    }

    #[inline]
    pub fn conductivity(&self, eos: &IdealGas, mu: f64) -> f64 {
        mu / ((eos.gamma() - 1.0) * self.prandtl)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EquationKind {
    Euler,
    NavierStokes,
}

/// The equation set of a run, chosen once at setup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EquationSet {
    Euler,
    NavierStokes(NavierStokes),
}

impl ConservationLaw for EquationSet {
    fn viscous(&self) -> Option<&NavierStokes> {
        match self {
            EquationSet::Euler => None,
            EquationSet::NavierStokes(ns) => Some(ns),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            EquationSet::Euler => "euler",
            EquationSet::NavierStokes(_) => "navierStokes",
        }
    }
}

impl fmt::Display for EquationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EquationSet::Euler => write!(f, "Euler"),
            EquationSet::NavierStokes(ns) => write!(
                f,
                "Navier-Stokes (Sutherland, T_ref = {} K, Pr = {})",
                ns.transport.reference_temperature(),
                ns.prandtl
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn only_navier_stokes_is_viscous() {
        assert!(EquationSet::Euler.viscous().is_none());
        let ns = NavierStokes::new(Sutherland::new(288.0), 0.5, 1000.0);
        let eqs = EquationSet::NavierStokes(ns);
        assert_eq!(eqs.system_size(), 5);
        let visc = eqs.viscous().unwrap();
        assert_relative_eq!(visc.viscosity(1.0), 5e-4, max_relative = 1e-14);
    }
}

//! Face fluxes of the compressible flow equations.

use serde::Deserialize;

use crate::{
    eos::IdealGas,
    state::{Primitive, StateVector},
    vector::Vector3,
};

pub mod jacobian;
pub mod roe;
pub mod rusanov;
pub mod viscous;

/// Exact inviscid flux `F(W)·n` through a face with unit normal `n`.
#[inline]
pub fn inviscid_flux(eos: &IdealGas, w: &Primitive, n: Vector3) -> StateVector {
    let vn = w.vel.dot(n);
    let m = w.rho * vn;
    [
        m,
        m * w.vel.x + w.p * n.x,
        m * w.vel.y + w.p * n.y,
        m * w.vel.z + w.p * n.z,
        m * w.enthalpy(eos),
    ]
}

/// An upwind approximation of the inviscid flux from the states on both
/// sides of a face. It must reduce to [`inviscid_flux`] when both states
/// are equal.
pub trait NumericalFlux: Send + Sync {
    fn flux(&self, eos: &IdealGas, left: &Primitive, right: &Primitive, n: Vector3) -> StateVector;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FluxScheme {
    #[default]
    Roe,
    Rusanov,
}

impl NumericalFlux for FluxScheme {
    #[inline]
    fn flux(&self, eos: &IdealGas, left: &Primitive, right: &Primitive, n: Vector3) -> StateVector {
        match self {
            FluxScheme::Roe => roe::Roe.flux(eos, left, right, n),
            FluxScheme::Rusanov => rusanov::Rusanov.flux(eos, left, right, n),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FluxScheme::Roe => roe::Roe.name(),
            FluxScheme::Rusanov => rusanov::Rusanov.name(),
        }
    }
}

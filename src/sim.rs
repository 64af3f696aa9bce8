use std::fmt;

use serde::Deserialize;

use crate::{
    bc::BoundarySpec,
    eos::IdealGas,
    error::ConfigError,
    flux::{FluxScheme, NumericalFlux},
    mesh::{BlockFace, Mesh},
    methods::MethodKind,
    problem::{ConservationLaw, EquationKind, EquationSet, NavierStokes},
    solver::TimeStep,
    state::Primitive,
    transport::Sutherland,
    vector::Vector3,
};

/// Dimensional free-stream conditions the run is scaled by.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reference {
    pub pressure: f64,
    pub density: f64,
    pub temperature: f64,
    pub velocity: [f64; 3],
    #[serde(default = "Reference::default_gamma")]
    pub gamma: f64,
    #[serde(default = "Reference::default_gas_constant")]
    pub gas_constant: f64,
    #[serde(default)]
    pub reynolds: Option<f64>,
}

impl Reference {
    fn default_gamma() -> f64 {
        1.4
    }

    fn default_gas_constant() -> f64 {
        287.058
    }

    /// Standard air at sea level moving with `velocity`.
    pub fn sea_level(velocity: Vector3) -> Self {
        Self {
            pressure: 101325.0,
            density: 1.2256,
            temperature: 288.0,
            velocity: velocity.to_array(),
            gamma: Self::default_gamma(),
            gas_constant: Self::default_gas_constant(),
            reynolds: None,
        }
    }

    pub fn with_reynolds(mut self, reynolds: f64) -> Self {
        self.reynolds = Some(reynolds);
        self
    }

    pub fn sound_speed(&self) -> f64 {
        IdealGas::new(self.gamma, self.gas_constant).sound_speed(self.pressure, self.density)
    }

    pub fn velocity(&self) -> Vector3 {
        Vector3::from_array(self.velocity)
    }

    pub fn mach(&self) -> f64 {
        self.velocity().mag() / self.sound_speed()
    }

    /// Angle of attack in the x-y plane, in degrees.
    pub fn alpha(&self) -> f64 {
        self.velocity[1].atan2(self.velocity[0]).to_degrees()
    }
}

/// Everything a run needs besides its observers.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub(crate) mesh: Mesh,
    pub(crate) reference: Reference,
    pub(crate) eos: IdealGas,
    pub(crate) equations: EquationSet,
    pub(crate) flux: FluxScheme,
    pub(crate) time_step: TimeStep,
    pub(crate) method: MethodKind,
    pub(crate) implicit_sweeps: usize,
    pub(crate) boundaries: Vec<[BoundarySpec; 6]>,
    pub(crate) iterations: usize,
}

impl Simulation {
    /// Inviscid explicit run at unit CFL with far-field conditions on every
    /// face.
    pub fn new(mesh: Mesh, reference: Reference) -> Self {
        let blocks = mesh.num_blocks();
        Self {
            mesh,
            eos: IdealGas::nondimensional(reference.gamma),
            reference,
            equations: EquationSet::Euler,
            flux: FluxScheme::default(),
            time_step: TimeStep::Cfl(1.0),
            method: MethodKind::default(),
            implicit_sweeps: 4,
            boundaries: vec![[BoundarySpec::FarField; 6]; blocks],
            iterations: 100,
        }
    }

    pub fn with_equations(mut self, kind: EquationKind) -> Result<Self, ConfigError> {
        self.equations = match kind {
            EquationKind::Euler => EquationSet::Euler,
            EquationKind::NavierStokes => {
                let reynolds = self
                    .reference
                    .reynolds
                    .filter(|re| *re > 0.0)
                    .ok_or(ConfigError::MissingReynolds)?;
                EquationSet::NavierStokes(NavierStokes::new(
                    Sutherland::new(self.reference.temperature),
                    self.reference.mach(),
                    reynolds,
                ))
            }
        };
        Ok(self)
    }

    pub fn with_flux(mut self, flux: FluxScheme) -> Self {
        self.flux = flux;
        self
    }

    pub fn with_time_step(mut self, time_step: TimeStep) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_method(mut self, method: MethodKind) -> Self {
        self.method = method;
        self
    }

    pub fn with_implicit_sweeps(mut self, sweeps: usize) -> Self {
        self.implicit_sweeps = sweeps;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_block_boundaries(mut self, block: usize, faces: [BoundarySpec; 6]) -> Result<Self, ConfigError> {
        let blocks = self.boundaries.len();
        *self
            .boundaries
            .get_mut(block)
            .ok_or(ConfigError::UnknownBlock { block, blocks })? = faces;
        Ok(self)
    }

    pub fn with_boundary(mut self, block: usize, face: BlockFace, spec: BoundarySpec) -> Result<Self, ConfigError> {
        let blocks = self.boundaries.len();
        self.boundaries
            .get_mut(block)
            .ok_or(ConfigError::UnknownBlock { block, blocks })?[face.index()] = spec;
        Ok(self)
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn eos(&self) -> &IdealGas {
        &self.eos
    }

    pub fn equations(&self) -> &EquationSet {
        &self.equations
    }

    pub fn flux(&self) -> &FluxScheme {
        &self.flux
    }

    pub fn time_step(&self) -> TimeStep {
        self.time_step
    }

    pub fn method(&self) -> MethodKind {
        self.method
    }

    pub fn implicit_sweeps(&self) -> usize {
        self.implicit_sweeps
    }

    pub fn boundaries(&self, block: usize) -> &[BoundarySpec; 6] {
        &self.boundaries[block]
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Nondimensional initial and far-field state.
    pub fn free_stream(&self) -> Primitive {
        Primitive::free_stream(&self.eos, self.reference.velocity() / self.reference.sound_speed())
    }
}

impl fmt::Display for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self.time_step {
            TimeStep::Fixed(dt) => format!("Δt = {dt:e}"),
            TimeStep::Cfl(cfl) => format!("CFL = {cfl}"),
        };
        write!(
            f,
            "simulation of {} flow:\n\t- {} blocks, {} cells\n\t- `{}` flux, `{:?}` time integration, {}\n\t- M = {:.4}, α = {:.2}°, {} iterations",
            self.equations,
            self.mesh.num_blocks(),
            self.mesh.num_cells(),
            self.flux.name(),
            self.method,
            step,
            self.reference.mach(),
            self.reference.alpha(),
            self.iterations,
        )?;
        if let Some(ns) = self.equations.viscous() {
            write!(f, ", Re = {}, Pr = {}", self.reference.reynolds.unwrap_or_default(), ns.prandtl())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::mesh::StructuredBlock;

    fn mesh() -> Mesh {
        Mesh::new(vec![
            StructuredBlock::cartesian([2, 2, 1], [1.0, 1.0, 1.0]).unwrap(),
            StructuredBlock::cartesian([2, 2, 1], [1.0, 1.0, 1.0]).unwrap(),
        ])
    }

    #[test]
    fn free_stream_is_scaled_by_the_reference_sound_speed() {
        let reference = Reference::sea_level(Vector3::new(170.0, 0.0, 0.0));
        let sim = Simulation::new(mesh(), reference);
        let w = sim.free_stream();
        assert_relative_eq!(w.rho, 1.0);
        assert_relative_eq!(w.p, 1.0 / 1.4);
        assert_relative_eq!(w.vel.x, 170.0 / reference.sound_speed());
        assert_relative_eq!(reference.mach(), w.vel.mag(), max_relative = 1e-14);
        assert_relative_eq!(reference.alpha(), 0.0);
    }

    #[test]
    fn navier_stokes_needs_a_reynolds_number() {
        let reference = Reference::sea_level(Vector3::new(100.0, 0.0, 0.0));
        assert!(matches!(
            Simulation::new(mesh(), reference).with_equations(EquationKind::NavierStokes),
            Err(ConfigError::MissingReynolds)
        ));
        let sim = Simulation::new(mesh(), reference.with_reynolds(1e5))
            .with_equations(EquationKind::NavierStokes)
            .unwrap();
        assert!(sim.equations().viscous().is_some());
    }

    #[test]
    fn boundaries_of_unknown_blocks_are_rejected() {
        let sim = Simulation::new(mesh(), Reference::sea_level(Vector3::ZERO));
        let sim = sim
            .with_boundary(1, BlockFace::KLower, BoundarySpec::Symmetry)
            .unwrap();
        assert_eq!(sim.boundaries(1)[BlockFace::KLower.index()], BoundarySpec::Symmetry);
        assert!(matches!(
            sim.with_block_boundaries(2, [BoundarySpec::SlipWall; 6]),
            Err(ConfigError::UnknownBlock { block: 2, blocks: 2 })
        ));
    }
}

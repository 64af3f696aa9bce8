//! Per-block flow update: face fluxes, residual, local time step and
//! implicit assembly.

use crate::{
    bc::{BlockBoundaries, BoundaryFace, InterfaceLayers, Layer},
    eos::IdealGas,
    error::{CellLocation, SolverError},
    flux::{jacobian::split_jacobians, viscous::viscous_flux, viscous::Gradients, FluxScheme, NumericalFlux},
    implicit::ImplicitSystem,
    mesh::{BlockFace, Direction, Side, StructuredBlock},
    metrics::BlockMetrics,
    norms::ResidualNorms,
    problem::{ConservationLaw, EquationSet},
    state::{axpy, Primitive, StateVector, NUM_EQNS, ZERO_STATE},
    vector::Vector3,
};

/// Constant weighting the viscous spectral radius in the local time step.
const VISCOUS_WEIGHT: f64 = 4.0;

/// How the pseudo-time step of each cell is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeStep {
    /// Same nondimensional step everywhere.
    Fixed(f64),
    /// Local step at the given Courant number.
    Cfl(f64),
}

impl TimeStep {
    pub fn value(&self) -> f64 {
        match *self {
            TimeStep::Fixed(v) | TimeStep::Cfl(v) => v,
        }
    }
}

/// Run-wide data shared by every block during one iteration.
#[derive(Clone, Copy)]
pub struct Ctx<'a> {
    pub eos: &'a IdealGas,
    pub equations: &'a EquationSet,
    pub flux: &'a FluxScheme,
    pub time_step: TimeStep,
    pub interfaces: &'a InterfaceLayers,
}

/// Cells on both sides of a face and the states used to evaluate its flux.
#[derive(Debug, Clone, Copy)]
struct FacePair {
    lower: Option<usize>,
    upper: Option<usize>,
    left: Primitive,
    right: Primitive,
    area: Vector3,
}

/// Owns the conserved state of one block and updates it.
pub struct BlockSolver {
    index: usize,
    metrics: BlockMetrics,
    boundaries: BlockBoundaries,
    state: Vec<StateVector>,
    residual: Vec<StateVector>,
    dt: Vec<f64>,
    implicit: Option<ImplicitSystem>,
}

impl BlockSolver {
    /// Computes the metrics of `block`, rejecting non-positive volumes, and
    /// fills it with `initial`. An implicit system with the given number of
    /// Gauss-Seidel sweeps is allocated only when `implicit_sweeps` is set.
    pub fn new(
        index: usize,
        block: &StructuredBlock,
        boundaries: BlockBoundaries,
        eos: &IdealGas,
        initial: Primitive,
        implicit_sweeps: Option<usize>,
    ) -> Result<Self, SolverError> {
        let metrics = BlockMetrics::compute(block);
        metrics.validate(index)?;
        let cells = metrics.cells();
        let n = cells.len();
        Ok(Self {
            index,
            boundaries,
            state: vec![initial.to_conserved(eos); n],
            residual: vec![ZERO_STATE; n],
            dt: vec![0.0; n],
            implicit: implicit_sweeps.map(|sweeps| ImplicitSystem::new(cells, sweeps)),
            metrics,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn metrics(&self) -> &BlockMetrics {
        &self.metrics
    }

    pub fn boundaries(&self) -> &BlockBoundaries {
        &self.boundaries
    }

    pub fn state(&self) -> &[StateVector] {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut [StateVector] {
        &mut self.state
    }

    /// Residual of the last evaluation, `−Σ(outflow − inflow)` per cell.
    pub fn residual(&self) -> &[StateVector] {
        &self.residual
    }

    pub fn time_steps(&self) -> &[f64] {
        &self.dt
    }

    pub fn implicit(&self) -> Option<&ImplicitSystem> {
        self.implicit.as_ref()
    }

    pub fn location(&self, cell: usize) -> CellLocation {
        CellLocation::new(self.index, self.metrics.cells().ijk(cell))
    }

    #[inline]
    pub fn primitive(&self, eos: &IdealGas, cell: usize) -> Primitive {
        Primitive::from_conserved(&self.state[cell], eos)
    }

    fn primitives(&self, eos: &IdealGas) -> Vec<Primitive> {
        self.state
            .iter()
            .map(|u| Primitive::from_conserved(u, eos))
            .collect()
    }

    /// States of the cells adjacent to `face`, as seen by the partner of an
    /// interface.
    pub fn face_layer(&self, eos: &IdealGas, face: BlockFace) -> Layer {
        let cells = self.metrics.cells();
        let direction = face.direction();
        let (t1, t2) = direction.tangents();
        let extents = cells.layer(direction);
        let mut ijk = [0; 3];
        ijk[direction.axis()] = match face.side() {
            Side::Lower => 0,
            Side::Upper => cells.get(direction.axis()) - 1,
        };
        let mut states = Vec::with_capacity(extents.0 * extents.1);
        for b in 0..extents.1 {
            for a in 0..extents.0 {
                ijk[t1] = a;
                ijk[t2] = b;
                states.push(self.primitive(eos, cells.offset(ijk)));
            }
        }
        Layer::new(extents, states)
    }

    fn face_pair(&self, ctx: &Ctx<'_>, prim: &[Primitive], direction: Direction, face: usize) -> FacePair {
        let cells = self.metrics.cells();
        let axis = direction.axis();
        let (t1, t2) = direction.tangents();
        let ijk = self.metrics.faces(direction).ijk(face);
        let area = self.metrics.face_area(direction, face);

        let lower = (ijk[axis] > 0).then(|| cells.offset(ijk) - cells.stride(axis));
        let upper = (ijk[axis] < cells.get(axis)).then(|| cells.offset(ijk));

        let ghost = |side: Side, interior: usize| {
            let bc = self.boundaries.get(BlockFace::new(direction, side));
            bc.ghost_state(&BoundaryFace {
                interior: prim[interior],
                normal: area.normalized(),
                position: (ijk[t1], ijk[t2]),
                interfaces: ctx.interfaces,
            })
        };

        let (left, right) = match (lower, upper) {
            (Some(l), Some(r)) => (prim[l], prim[r]),
            (None, Some(r)) => (ghost(Side::Lower, r), prim[r]),
            (Some(l), None) => (prim[l], ghost(Side::Upper, l)),
            (None, None) => unreachable!("a face borders at least one cell"),
        };

        FacePair {
            lower,
            upper,
            left,
            right,
            area,
        }
    }

    /// Adds `flux` leaving `lower` and entering `upper` to the residual.
    #[inline]
    fn scatter(&mut self, pair: &FacePair, flux: &StateVector) {
        if let Some(l) = pair.lower {
            axpy(&mut self.residual[l], -1.0, flux);
        }
        if let Some(r) = pair.upper {
            axpy(&mut self.residual[r], 1.0, flux);
        }
    }

    fn inviscid_fluxes(&mut self, ctx: &Ctx<'_>, prim: &[Primitive], direction: Direction) {
        let faces = self.metrics.faces(direction).len();
        let fluxes: Vec<_> = (0..faces)
            .map(|f| {
                let pair = self.face_pair(ctx, prim, direction, f);
                let mag = pair.area.mag();
                let mut flux = ctx.flux.flux(ctx.eos, &pair.left, &pair.right, pair.area / mag);
                flux.iter_mut().for_each(|v| *v *= mag);
                (pair, flux)
            })
            .collect();
        for (pair, flux) in &fluxes {
            self.scatter(pair, flux);
        }
    }

    /// Green-Gauss cell gradients of velocity and temperature, with face
    /// values averaged from the two sides of every face. Face gradients
    /// average the two cells and take their component along the line of
    /// centroids from the values on either end.
    fn gradients(&self, ctx: &Ctx<'_>, prim: &[Primitive]) -> Vec<Gradients> {
        let mut grad = vec![Gradients::default(); prim.len()];
        for direction in Direction::ALL {
            for f in 0..self.metrics.faces(direction).len() {
                let pair = self.face_pair(ctx, prim, direction, f);
                let w = pair.left.average(&pair.right);
                let t = 0.5 * (pair.left.temperature(ctx.eos) + pair.right.temperature(ctx.eos));
                let contribution = Gradients::from_face(w.vel, t, pair.area);
                if let Some(l) = pair.lower {
                    grad[l] = grad[l] + contribution;
                }
                if let Some(r) = pair.upper {
                    grad[r] = grad[r] + contribution * -1.0;
                }
            }
        }
        for (g, v) in grad.iter_mut().zip(self.metrics.volumes()) {
            *g = *g * (1.0 / v);
        }
        grad
    }

    fn viscous_fluxes(&mut self, ctx: &Ctx<'_>, prim: &[Primitive], grad: &[Gradients], direction: Direction) {
        let Some(ns) = ctx.equations.viscous() else {
            return;
        };
        let faces = self.metrics.faces(direction).len();
        let fluxes: Vec<_> = (0..faces)
            .map(|f| {
                let pair = self.face_pair(ctx, prim, direction, f);
                let w = pair.left.average(&pair.right);
                let (tl, tr) = (pair.left.temperature(ctx.eos), pair.right.temperature(ctx.eos));
                let t = 0.5 * (tl + tr);
                let (left, right, face) = ((pair.left.vel, tl), (pair.right.vel, tr), (w.vel, t));
                let centroid = |c: usize| self.metrics.centroid(c);
                let center = || self.metrics.face_center(direction, f);
                // boundary values sit at the face center
                let face_grad = match (pair.lower, pair.upper) {
                    (Some(l), Some(r)) => ((grad[l] + grad[r]) * 0.5).along(left, right, centroid(r) - centroid(l)),
                    (Some(l), None) => grad[l].along(left, face, center() - centroid(l)),
                    (None, Some(r)) => grad[r].along(face, right, centroid(r) - center()),
                    (None, None) => Gradients::default(),
                };
                let mu = ns.viscosity(t);
                let k = ns.conductivity(ctx.eos, mu);
                // diffusive flux enters with the opposite sign of the convective one
                let mut flux = viscous_flux(mu, k, w.vel, &face_grad, pair.area);
                flux.iter_mut().for_each(|v| *v = -*v);
                (pair, flux)
            })
            .collect();
        for (pair, flux) in &fluxes {
            self.scatter(pair, flux);
        }
    }

    /// Recomputes the residual of the current state.
    pub fn evaluate(&mut self, ctx: &Ctx<'_>) {
        self.residual.fill(ZERO_STATE);
        let prim = self.primitives(ctx.eos);
        for direction in Direction::ALL {
            self.inviscid_fluxes(ctx, &prim, direction);
        }
        if ctx.equations.viscous().is_some() {
            let grad = self.gradients(ctx, &prim);
            for direction in Direction::ALL {
                self.viscous_fluxes(ctx, &prim, &grad, direction);
            }
        }
    }

    /// Local time step of every cell,
    /// `Δt = CFL·V / Σ_d (λc_d + C·λv_d)`, or the fixed step.
    pub fn compute_time_steps(&mut self, ctx: &Ctx<'_>) {
        let cfl = match ctx.time_step {
            TimeStep::Fixed(dt) => {
                self.dt.fill(dt);
                return;
            }
            TimeStep::Cfl(cfl) => cfl,
        };
        let viscous = ctx.equations.viscous();
        let cells = self.metrics.cells();
        for c in 0..cells.len() {
            let w = self.primitive(ctx.eos, c);
            let volume = self.metrics.volume(c);
            let ijk = cells.ijk(c);
            let mut spectral = 0.0;
            for direction in Direction::ALL {
                let (lo, hi) = self.metrics.bounding_faces(direction, ijk);
                let (a_lo, a_hi) = (
                    self.metrics.face_area(direction, lo),
                    self.metrics.face_area(direction, hi),
                );
                spectral += 0.5
                    * (w.spectral_radius(ctx.eos, a_lo.normalized()) * a_lo.mag()
                        + w.spectral_radius(ctx.eos, a_hi.normalized()) * a_hi.mag());
                if let Some(ns) = viscous {
                    let mu = ns.viscosity(w.temperature(ctx.eos));
                    let ds = 0.5 * (a_lo.mag() + a_hi.mag());
                    let lambda_v = (4.0_f64 / 3.0).max(ctx.eos.gamma()) / w.rho * mu / ns.prandtl()
                        * ds
                        * ds
                        / volume;
                    spectral += VISCOUS_WEIGHT * lambda_v;
                }
            }
            self.dt[c] = cfl * volume / spectral;
        }
    }

    /// Assembles `M = V/Δt·I − ∂R/∂U` from the split inviscid Jacobians.
    /// Boundary faces only contribute to the interior cell.
    pub fn assemble_implicit(&mut self, ctx: &Ctx<'_>) {
        let Some(mut sys) = self.implicit.take() else {
            return;
        };
        sys.clear();
        let prim = self.primitives(ctx.eos);
        for direction in Direction::ALL {
            for f in 0..self.metrics.faces(direction).len() {
                let pair = self.face_pair(ctx, &prim, direction, f);
                let mag = pair.area.mag();
                let (jl, jr) = split_jacobians(ctx.eos, &pair.left, &pair.right, pair.area / mag);
                if let Some(l) = pair.lower {
                    sys.main_mut().add(l, mag, jl.as_ref());
                    if pair.upper.is_some() {
                        sys.upper_mut(direction).add(l, mag, jr.as_ref());
                    }
                }
                if let Some(r) = pair.upper {
                    sys.main_mut().add(r, -mag, jr.as_ref());
                    if pair.lower.is_some() {
                        sys.lower_mut(direction).add(r, -mag, jl.as_ref());
                    }
                }
            }
        }
        for (c, (v, dt)) in self.metrics.volumes().iter().zip(&self.dt).enumerate() {
            sys.main_mut().add_identity(c, v / dt);
        }
        self.implicit = Some(sys);
    }

    /// Solves the assembled system for the state correction and applies it.
    pub fn implicit_update(&mut self) -> Result<(), SolverError> {
        let Some(sys) = self.implicit.as_ref() else {
            return Ok(());
        };
        let du = sys.solve(self.index, &self.residual)?;
        for (u, du) in self.state.iter_mut().zip(&du) {
            axpy(u, 1.0, du);
        }
        Ok(())
    }

    /// Residual scaled to a per-step increment, `Δt/V · R`.
    pub fn increments(&self) -> Vec<StateVector> {
        self.residual
            .iter()
            .zip(self.metrics.volumes())
            .zip(&self.dt)
            .map(|((r, v), dt)| r.map(|r| dt / v * r))
            .collect()
    }

    /// This block's contribution to the global residual norms.
    pub fn residual_norms(&self) -> ResidualNorms {
        let mut norms = ResidualNorms::default();
        for (c, r) in self.residual.iter().enumerate() {
            norms.accumulate(self.location(c), r);
        }
        norms
    }

    /// Fails on the first cell whose state is not finite or not physical.
    pub fn check_state(&self, eos: &IdealGas) -> Result<(), SolverError> {
        for (c, u) in self.state.iter().enumerate() {
            if let Some(eqn) = (0..NUM_EQNS).find(|&e| !u[e].is_finite()) {
                return Err(SolverError::NonFinite {
                    at: self.location(c),
                    eqn,
                });
            }
            let w = Primitive::from_conserved(u, eos);
            if !w.is_physical() {
                return Err(SolverError::NonPhysical {
                    at: self.location(c),
                    density: w.rho,
                    pressure: w.p,
                });
            }
        }
        Ok(())
    }
}

use serde::Deserialize;

use crate::{
    error::SolverError,
    method::{explicit_euler, rk4, Method, Semidiscrete},
    norms::ResidualNorms,
    solver::{BlockSolver, Ctx},
    state::StateVector,
};

/// A block seen as an ODE system in pseudo-time. The rate of each cell is
/// pre-scaled by its local `Δt/V`, so stages advance with a unit step.
struct Stage<'s, 'c> {
    solver: &'s mut BlockSolver,
    ctx: &'s Ctx<'c>,
}

impl Semidiscrete for Stage<'_, '_> {
    fn unknowns(&self) -> &[StateVector] {
        self.solver.state()
    }

    fn unknowns_mut(&mut self) -> &mut [StateVector] {
        self.solver.state_mut()
    }

    fn rate(&mut self) -> Result<Vec<StateVector>, SolverError> {
        self.solver.evaluate(self.ctx);
        Ok(self.solver.increments())
    }
}

/// Residual and time step of the current state, shared by every method.
fn prepare(solver: &mut BlockSolver, ctx: &Ctx<'_>) -> ResidualNorms {
    solver.evaluate(ctx);
    solver.compute_time_steps(ctx);
    solver.residual_norms()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitEuler;

impl Method for ExplicitEuler {
    fn advance(&self, solver: &mut BlockSolver, ctx: &Ctx<'_>) -> Result<ResidualNorms, SolverError> {
        let norms = prepare(solver, ctx);
        let k1 = solver.increments();
        explicit_euler(&mut Stage { solver, ctx }, 1.0, &k1);
        Ok(norms)
    }

    fn name(&self) -> &'static str {
        "Explicit Euler"
    }
}

/// Four-stage Runge-Kutta. The local time step is frozen at the first stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct RungeKutta4;

impl Method for RungeKutta4 {
    fn advance(&self, solver: &mut BlockSolver, ctx: &Ctx<'_>) -> Result<ResidualNorms, SolverError> {
        let norms = prepare(solver, ctx);
        let k1 = solver.increments();
        rk4(&mut Stage { solver, ctx }, 1.0, &k1)?;
        Ok(norms)
    }

    fn name(&self) -> &'static str {
        "Runge-Kutta 4"
    }
}

/// Backward Euler linearized about the current state, solved by symmetric
/// block Gauss-Seidel.
#[derive(Debug, Clone, Copy)]
pub struct ImplicitEuler {
    pub sweeps: usize,
}

impl Default for ImplicitEuler {
    fn default() -> Self {
        Self { sweeps: 4 }
    }
}

impl Method for ImplicitEuler {
    fn implicit_sweeps(&self) -> Option<usize> {
        Some(self.sweeps)
    }

    fn advance(&self, solver: &mut BlockSolver, ctx: &Ctx<'_>) -> Result<ResidualNorms, SolverError> {
        let norms = prepare(solver, ctx);
        solver.assemble_implicit(ctx);
        solver.implicit_update()?;
        Ok(norms)
    }

    fn name(&self) -> &'static str {
        "Implicit Euler"
    }
}

/// Configured time integration scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MethodKind {
    #[default]
    ExplicitEuler,
    Rk4,
    ImplicitEuler,
}

impl MethodKind {
    pub fn build(self, implicit_sweeps: usize) -> Box<dyn Method> {
        match self {
            MethodKind::ExplicitEuler => Box::new(ExplicitEuler),
            MethodKind::Rk4 => Box::new(RungeKutta4),
            MethodKind::ImplicitEuler => Box::new(ImplicitEuler {
                sweeps: implicit_sweeps,
            }),
        }
    }
}

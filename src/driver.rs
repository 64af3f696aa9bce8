use std::{collections::BTreeSet, io::Write};

use rayon::prelude::*;

use crate::{
    bc::{BlockBoundaries, InterfaceLayers},
    error::{ConfigError, SolverError},
    mesh::BlockFace,
    method::Method,
    norms::{ResidualMonitor, ResidualNorms, ResidualReport},
    sim::Simulation,
    solver::{BlockSolver, Ctx, TimeStep},
};

pub struct ObsCtx<'ctx> {
    sim: &'ctx Simulation,
    method: &'ctx dyn Method,
    solvers: &'ctx [BlockSolver],
    output_frequency: usize,

    // completed iterations
    iter: usize,
    report: Option<&'ctx ResidualReport>,
}

impl<'ctx> ObsCtx<'ctx> {
    pub fn simulation(&self) -> &Simulation {
        self.sim
    }

    pub fn method(&self) -> &dyn Method {
        self.method
    }

    pub fn solvers(&self) -> &[BlockSolver] {
        self.solvers
    }

    pub fn iter(&self) -> usize {
        self.iter
    }

    /// Residual of the latest iteration; `None` before the first one.
    pub fn report(&self) -> Option<&ResidualReport> {
        self.report
    }

    pub fn output_frequency(&self) -> usize {
        self.output_frequency
    }

    /// Simulated nondimensional time. Runs with a local time step have no
    /// global clock and report the iteration count instead.
    pub fn time(&self) -> f64 {
        match self.sim.time_step {
            TimeStep::Fixed(dt) => self.iter as f64 * dt,
            TimeStep::Cfl(_) => self.iter as f64,
        }
    }
}

#[allow(unused_variables)]
pub trait Observer {
    fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
        Ok(())
    }

    fn at_each_iteration(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
        Ok(())
    }

    /// Called every `output_frequency` iterations.
    fn at_output(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
        Ok(())
    }

    fn at_cleanup(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
        Ok(())
    }
}

pub struct Driver<'d> {
    sim: Simulation,
    method: Box<dyn Method>,
    solvers: Vec<BlockSolver>,
    partners: Vec<(usize, BlockFace)>,
    observers: Vec<Box<dyn Observer + 'd>>,
    output_frequency: usize,
}

impl<'d> Driver<'d> {
    /// Sets up one solver per block, initialized with the free stream.
    pub fn new(sim: Simulation) -> Result<Self, SolverError> {
        let partners = Self::check_interfaces(&sim)?;
        let method = sim.method.build(sim.implicit_sweeps);
        let free_stream = sim.free_stream();
        let solvers = sim
            .mesh
            .blocks()
            .iter()
            .enumerate()
            .map(|(b, block)| {
                BlockSolver::new(
                    b,
                    block,
                    BlockBoundaries::new(&sim.boundaries[b], free_stream),
                    &sim.eos,
                    free_stream,
                    method.implicit_sweeps(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let output_frequency = sim.iterations.max(1);

        Ok(Self {
            sim,
            method,
            solvers,
            partners,
            observers: Vec::new(),
            output_frequency,
        })
    }

    /// Interface partners must exist and match the in-face extents of the
    /// faces they connect to.
    fn check_interfaces(sim: &Simulation) -> Result<Vec<(usize, BlockFace)>, ConfigError> {
        let blocks = sim.mesh.blocks();
        let mut partners = BTreeSet::new();
        for (b, specs) in sim.boundaries.iter().enumerate() {
            for face in BlockFace::ALL {
                let Some((p, pface)) = specs[face.index()].partner() else {
                    continue;
                };
                let Some(partner) = blocks.get(p) else {
                    return Err(ConfigError::Interface {
                        block: b,
                        face,
                        reason: format!("partner block {p} does not exist"),
                    });
                };
                let ours = blocks[b].cells().layer(face.direction());
                let theirs = partner.cells().layer(pface.direction());
                if ours != theirs {
                    return Err(ConfigError::Interface {
                        block: b,
                        face,
                        reason: format!("{ours:?} cells do not match {theirs:?} on block {p} face {pface}"),
                    });
                }
                partners.insert((p, pface.index()));
            }
        }
        Ok(partners
            .into_iter()
            .map(|(p, f)| (p, BlockFace::ALL[f]))
            .collect())
    }

    pub fn with_output_frequency(mut self, output_frequency: usize) -> Self {
        self.output_frequency = output_frequency.max(1);
        self
    }

    pub fn with_observer(mut self, observer: impl Observer + 'd) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn solvers(&self) -> &[BlockSolver] {
        &self.solvers
    }

    pub fn solvers_mut(&mut self) -> &mut [BlockSolver] {
        &mut self.solvers
    }

    /// Face layers read by interface conditions during the next iteration.
    fn capture_interfaces(&self) -> InterfaceLayers {
        let mut layers = InterfaceLayers::default();
        for &(p, face) in &self.partners {
            layers.insert(p, face, self.solvers[p].face_layer(&self.sim.eos, face));
        }
        layers
    }

    /// Advances every block by one iteration and merges their residual norms.
    pub fn step(&mut self) -> Result<ResidualNorms, SolverError> {
        let interfaces = self.capture_interfaces();
        let Self {
            sim,
            method,
            solvers,
            ..
        } = self;
        let ctx = Ctx {
            eos: &sim.eos,
            equations: &sim.equations,
            flux: &sim.flux,
            time_step: sim.time_step,
            interfaces: &interfaces,
        };
        let method: &dyn Method = &**method;

        // blocks only see each other through the frozen layers
        let partial = solvers
            .par_iter_mut()
            .map(|solver| {
                let norms = method.advance(solver, &ctx)?;
                solver.check_state(ctx.eos)?;
                Ok(norms)
            })
            .collect::<Result<Vec<_>, SolverError>>()?;

        Ok(partial
            .into_iter()
            .fold(ResidualNorms::default(), ResidualNorms::merge))
    }

    /// Runs the configured number of iterations and returns the residual
    /// of the last one.
    pub fn run(&mut self) -> Result<Option<ResidualReport>, SolverError> {
        let mut observers = std::mem::take(&mut self.observers);
        let result = self.run_with(&mut observers);
        self.observers = observers;
        result
    }

    fn obs_ctx<'a>(&'a self, iter: usize, report: Option<&'a ResidualReport>) -> ObsCtx<'a> {
        ObsCtx {
            sim: &self.sim,
            method: &*self.method,
            solvers: &self.solvers,
            output_frequency: self.output_frequency,
            iter,
            report,
        }
    }

    fn run_with(&mut self, observers: &mut [Box<dyn Observer + 'd>]) -> Result<Option<ResidualReport>, SolverError> {
        for o in observers.iter_mut() {
            o.at_startup(self.obs_ctx(0, None))?;
        }

        let mut monitor = ResidualMonitor::default();
        let mut last = None;
        for nn in 0..self.sim.iterations {
            let norms = self.step()?;
            let report = monitor.report(nn, &norms);

            for o in observers.iter_mut() {
                o.at_each_iteration(self.obs_ctx(nn + 1, Some(&report)))?;
            }
            if (nn + 1) % self.output_frequency == 0 {
                for o in observers.iter_mut() {
                    o.at_output(self.obs_ctx(nn + 1, Some(&report)))?;
                }
            }
            last = Some(report);
        }

        for o in observers.iter_mut() {
            o.at_cleanup(self.obs_ctx(self.sim.iterations, last.as_ref()))?;
        }
        Ok(last)
    }
}

pub struct Logger;

impl Observer for Logger {
    fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
        tracing::event!(
            tracing::Level::INFO,
            "start of {} (`{}` method)",
            ctx.simulation(),
            ctx.method().name(),
        );
        Ok(())
    }

    fn at_each_iteration(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
        let Some(report) = ctx.report() else {
            return Ok(());
        };
        let l2 = report.l2;
        match report.linf {
            Some(max) => tracing::event!(
                tracing::Level::INFO,
                "step {}: L2 [{:.4e} {:.4e} {:.4e} {:.4e} {:.4e}], max {:.4e} (equation {}, {})",
                report.iteration,
                l2[0],
                l2[1],
                l2[2],
                l2[3],
                l2[4],
                max.value,
                max.eqn,
                max.at,
            ),
            None => tracing::event!(tracing::Level::INFO, "step {}: no cells", report.iteration),
        }
        Ok(())
    }

    fn at_output(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
        tracing::event!(tracing::Level::DEBUG, "output at iteration {}", ctx.iter());
        Ok(())
    }

    fn at_cleanup(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
        tracing::event!(
            tracing::Level::INFO,
            "finished {} iterations",
            ctx.iter()
        );
        Ok(())
    }
}

/// Collects every residual report.
#[derive(Debug)]
pub struct ResidualHistory<'a> {
    reports: &'a mut Vec<ResidualReport>,
}

impl<'a> ResidualHistory<'a> {
    pub fn new(reports: &'a mut Vec<ResidualReport>) -> Self {
        Self { reports }
    }
}

impl Observer for ResidualHistory<'_> {
    fn at_each_iteration(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
        if let Some(report) = ctx.report() {
            self.reports.push(*report);
        }
        Ok(())
    }
}

/// Writes one text row per iteration: step, time step or CFL, the five
/// normalized L2 norms, then the L∞ equation, block, cell and value.
pub struct ResidualWriter<W> {
    output: W,
}

impl<W: Write> ResidualWriter<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }
}

impl<W: Write> Observer for ResidualWriter<W> {
    fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
        let step = match ctx.simulation().time_step() {
            TimeStep::Fixed(_) => "dt",
            TimeStep::Cfl(_) => "cfl",
        };
        writeln!(
            self.output,
            "# step {step} res-mass res-mom-x res-mom-y res-mom-z res-energy max-eqn max-block max-i max-j max-k max-res"
        )?;
        Ok(())
    }

    fn at_each_iteration(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
        let Some(report) = ctx.report() else {
            return Ok(());
        };
        write!(
            self.output,
            "{} {:e}",
            report.iteration,
            ctx.simulation().time_step().value()
        )?;
        for v in report.l2 {
            write!(self.output, " {v:.6e}")?;
        }
        match report.linf {
            Some(max) => writeln!(
                self.output,
                " {} {} {} {} {} {:.6e}",
                max.eqn, max.at.block, max.at.i, max.at.j, max.at.k, max.value
            )?,
            None => writeln!(self.output)?,
        }
        Ok(())
    }

    fn at_cleanup(&mut self, _ctx: ObsCtx) -> Result<(), SolverError> {
        self.output.flush().map_err(SolverError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bc::BoundarySpec,
        mesh::{Mesh, StructuredBlock},
        sim::Reference,
        vector::Vector3,
    };

    fn two_blocks() -> Simulation {
        let mesh = Mesh::new(vec![
            StructuredBlock::cartesian([3, 2, 1], [1.0, 1.0, 0.5]).unwrap(),
            StructuredBlock::cartesian([4, 2, 1], [1.0, 1.0, 0.5]).unwrap(),
        ]);
        Simulation::new(mesh, Reference::sea_level(Vector3::new(100.0, 0.0, 0.0)))
            .with_iterations(6)
    }

    #[test]
    fn interfaces_must_match() {
        let sim = two_blocks()
            .with_boundary(0, BlockFace::IUpper, BoundarySpec::Interface {
                block: 1,
                face: BlockFace::ILower,
            })
            .unwrap();
        assert!(Driver::new(sim.clone()).is_ok());

        let missing = sim
            .clone()
            .with_boundary(1, BlockFace::ILower, BoundarySpec::Interface {
                block: 4,
                face: BlockFace::IUpper,
            })
            .unwrap();
        assert!(matches!(
            Driver::new(missing),
            Err(SolverError::Config(ConfigError::Interface { block: 1, .. }))
        ));

        // j faces span 3 and 4 cells along i
        let mismatch = sim
            .with_boundary(0, BlockFace::JUpper, BoundarySpec::Interface {
                block: 1,
                face: BlockFace::JLower,
            })
            .unwrap();
        assert!(matches!(
            Driver::new(mismatch),
            Err(SolverError::Config(ConfigError::Interface {
                block: 0,
                face: BlockFace::JUpper,
                ..
            }))
        ));
    }

    #[derive(Default)]
    struct Counter {
        startup: usize,
        iterations: usize,
        outputs: Vec<usize>,
        cleanup: usize,
    }

    impl Observer for &mut Counter {
        fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
            assert!(ctx.report().is_none());
            self.startup += 1;
            Ok(())
        }

        fn at_each_iteration(&mut self, _ctx: ObsCtx) -> Result<(), SolverError> {
            self.iterations += 1;
            Ok(())
        }

        fn at_output(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
            self.outputs.push(ctx.iter());
            Ok(())
        }

        fn at_cleanup(&mut self, _ctx: ObsCtx) -> Result<(), SolverError> {
            self.cleanup += 1;
            Ok(())
        }
    }

    #[test]
    fn observers_follow_the_output_cadence() {
        let mut counter = Counter::default();
        let mut reports = Vec::new();
        let mut rows = Vec::new();
        Driver::new(two_blocks())
            .unwrap()
            .with_output_frequency(4)
            .with_observer(&mut counter)
            .with_observer(ResidualHistory::new(&mut reports))
            .with_observer(ResidualWriter::new(&mut rows))
            .run()
            .unwrap();

        assert_eq!(counter.startup, 1);
        assert_eq!(counter.iterations, 6);
        assert_eq!(counter.outputs, vec![4]);
        assert_eq!(counter.cleanup, 1);
        assert_eq!(reports.len(), 6);
        assert_eq!(reports[0].l2, [1.0; 5]);

        let text = String::from_utf8(rows).unwrap();
        assert_eq!(text.lines().count(), 7);
        assert!(text.starts_with("# step cfl"));
    }
}

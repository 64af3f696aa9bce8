use blockflow::{
    bc::BoundarySpec, methods::MethodKind, vector::Vector3, BlockFace, Dims, Driver, Logger, Mesh,
    Reference, ResidualHistory, Simulation, StructuredBlock, TimeStep,
};
use tracing::info;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    info!("setting up a two-block channel");

    // a bump in the lower wall of the second block
    let upstream = StructuredBlock::cartesian([16, 8, 1], [1.0, 0.5, 0.0625])?;
    let bump = StructuredBlock::from_fn(Dims::new(17, 9, 2), |[i, j, k]| {
        let x = 1.0 + i as f64 / 16.0;
        let eta = j as f64 / 8.0;
        let floor = 0.04 * (std::f64::consts::PI * (x - 1.0)).sin();
        Vector3::new(x, floor + eta * (0.5 - floor), k as f64 * 0.0625)
    })?;
    let mesh = Mesh::new(vec![upstream, bump]);

    let reference = Reference::sea_level(Vector3::new(170.0, 0.0, 0.0));
    let mut sim = Simulation::new(mesh, reference)
        .with_method(MethodKind::ImplicitEuler)
        .with_time_step(TimeStep::Cfl(5.0))
        .with_iterations(300)
        .with_boundary(0, BlockFace::IUpper, BoundarySpec::Interface {
            block: 1,
            face: BlockFace::ILower,
        })?
        .with_boundary(1, BlockFace::ILower, BoundarySpec::Interface {
            block: 0,
            face: BlockFace::IUpper,
        })?;
    for block in 0..2 {
        for face in [BlockFace::JLower, BlockFace::JUpper] {
            sim = sim.with_boundary(block, face, BoundarySpec::SlipWall)?;
        }
        for face in [BlockFace::KLower, BlockFace::KUpper] {
            sim = sim.with_boundary(block, face, BoundarySpec::Symmetry)?;
        }
    }
    info!("{sim}");

    let mut reports = Vec::new();
    Driver::new(sim)?
        .with_output_frequency(50)
        .with_observer(Logger)
        .with_observer(ResidualHistory::new(&mut reports))
        .run()?;

    if let Some(last) = reports.last() {
        info!("mass residual dropped to {:.3e}", last.l2[0]);
    }
    Ok(())
}

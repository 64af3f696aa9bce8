use std::{fs::File, io::BufWriter, path::PathBuf, time::Instant};

use anyhow::Context;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use blockflow::{plot3d, plot3d::Plot3dWriter, Config, Driver, Logger, ResidualWriter};

/// Multi-block structured solver for the compressible Euler and
/// Navier-Stokes equations
#[derive(Parser)]
#[command(name = "blockflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Run configuration (TOML)
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

fn main() -> anyhow::Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // arithmetic faults are caught by the state checks after every update,
    // so the default non-trapping floating-point environment is kept
    let config = Config::from_file(&cli.config)
        .with_context(|| format!("invalid configuration `{}`", cli.config.display()))?;
    let mesh = plot3d::read_grid(&config.grid)
        .with_context(|| format!("cannot read grid `{}`", config.grid.display()))?;
    let sim = config.simulation(mesh)?;

    let residuals = BufWriter::new(File::create(config.grid.with_extension("res"))?);
    let last = Driver::new(sim)?
        .with_output_frequency(config.output_frequency)
        .with_observer(Logger)
        .with_observer(ResidualWriter::new(residuals))
        .with_observer(Plot3dWriter::new(&config.grid))
        .run()?;

    if let Some(report) = last {
        let l2 = report.l2.map(|v| format!("{v:.4e}"));
        tracing::info!("final normalized L2 residuals: {}", l2.join(" "));
    }
    tracing::info!("total time: {:.3} s", start.elapsed().as_secs_f64());
    Ok(())
}

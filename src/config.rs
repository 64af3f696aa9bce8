//! Run configuration read from a TOML file.
//!
//! ```toml
//! grid = "channel.xyz"
//! equations = "euler"
//! time_integration = "explicitEuler"
//! cfl = 0.8
//! iterations = 1000
//! output_frequency = 100
//!
//! [reference]
//! pressure = 101325.0
//! density = 1.2256
//! temperature = 288.0
//! velocity = [170.0, 0.0, 0.0]
//!
//! [[boundaries]]
//! block = 0
//! jLower = { type = "slipWall" }
//! jUpper = { type = "slipWall" }
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;

use crate::{
    bc::BoundarySpec,
    error::{ConfigError, SolverError},
    flux::FluxScheme,
    mesh::Mesh,
    methods::MethodKind,
    problem::EquationKind,
    sim::{Reference, Simulation},
    solver::TimeStep,
};

fn default_sweeps() -> usize {
    4
}

/// Boundary conditions of the faces of one block. Faces left out are
/// far-field.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BlockBoundaryConfig {
    pub block: usize,
    #[serde(default)]
    pub i_lower: BoundarySpec,
    #[serde(default)]
    pub i_upper: BoundarySpec,
    #[serde(default)]
    pub j_lower: BoundarySpec,
    #[serde(default)]
    pub j_upper: BoundarySpec,
    #[serde(default)]
    pub k_lower: BoundarySpec,
    #[serde(default)]
    pub k_upper: BoundarySpec,
}

impl BlockBoundaryConfig {
    /// Faces in [`crate::mesh::BlockFace::ALL`] order.
    pub fn faces(&self) -> [BoundarySpec; 6] {
        [
            self.i_lower,
            self.i_upper,
            self.j_lower,
            self.j_upper,
            self.k_lower,
            self.k_upper,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub grid: PathBuf,
    pub equations: EquationKind,
    pub time_integration: MethodKind,
    #[serde(default)]
    pub flux: FluxScheme,
    #[serde(default)]
    pub dt: Option<f64>,
    #[serde(default)]
    pub cfl: Option<f64>,
    pub iterations: usize,
    pub output_frequency: usize,
    #[serde(default = "default_sweeps")]
    pub implicit_sweeps: usize,
    pub reference: Reference,
    #[serde(default)]
    pub boundaries: Vec<BlockBoundaryConfig>,
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Reads and validates a configuration file. A relative grid path is
    /// taken relative to the directory of the file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config: Config = fs::read_to_string(path)?.parse()?;
        if config.grid.is_relative() {
            if let Some(dir) = path.parent() {
                config.grid = dir.join(&config.grid);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.time_step()?;
        if self.iterations == 0 || self.output_frequency == 0 {
            return Err(ConfigError::Cadence);
        }
        if self.equations == EquationKind::NavierStokes
            && !self.reference.reynolds.is_some_and(|re| re > 0.0)
        {
            return Err(ConfigError::MissingReynolds);
        }
        Ok(())
    }

    pub fn time_step(&self) -> Result<TimeStep, ConfigError> {
        match (self.dt, self.cfl) {
            (Some(dt), None) if dt > 0.0 => Ok(TimeStep::Fixed(dt)),
            (None, Some(cfl)) if cfl > 0.0 => Ok(TimeStep::Cfl(cfl)),
            _ => Err(ConfigError::TimeStep),
        }
    }

    /// Binds the configuration to a mesh.
    pub fn simulation(&self, mesh: Mesh) -> Result<Simulation, SolverError> {
        let mut sim = Simulation::new(mesh, self.reference)
            .with_equations(self.equations)?
            .with_flux(self.flux)
            .with_time_step(self.time_step()?)
            .with_method(self.time_integration)
            .with_implicit_sweeps(self.implicit_sweeps)
            .with_iterations(self.iterations);
        for entry in &self.boundaries {
            sim = sim.with_block_boundaries(entry.block, entry.faces())?;
        }
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::mesh::{BlockFace, StructuredBlock};

    const BASE: &str = r#"
        grid = "box.xyz"
        equations = "euler"
        time_integration = "rk4"
        iterations = 10
        output_frequency = 5

        [reference]
        pressure = 101325.0
        density = 1.2256
        temperature = 288.0
        velocity = [100.0, 0.0, 0.0]
    "#;

    #[test]
    fn exactly_one_time_step_kind() {
        assert!(matches!(BASE.parse::<Config>(), Err(ConfigError::TimeStep)));
        let both = format!("dt = 0.1\ncfl = 1.0\n{BASE}");
        assert!(matches!(both.parse::<Config>(), Err(ConfigError::TimeStep)));
        let negative = format!("cfl = -1.0\n{BASE}");
        assert!(matches!(negative.parse::<Config>(), Err(ConfigError::TimeStep)));

        let config: Config = format!("cfl = 2.0\n{BASE}").parse().unwrap();
        assert_eq!(config.time_step().unwrap(), TimeStep::Cfl(2.0));
        assert_eq!(config.time_integration, MethodKind::Rk4);
        assert_eq!(config.implicit_sweeps, 4);
        assert_eq!(config.reference.gamma, 1.4);
    }

    #[test]
    fn unknown_variants_are_rejected() {
        let bad = format!("cfl = 1.0\n{}", BASE.replace("\"euler\"", "\"stokes\""));
        assert!(matches!(bad.parse::<Config>(), Err(ConfigError::Parse(_))));
        let bad = format!("cfl = 1.0\n{}", BASE.replace("\"rk4\"", "\"leapfrog\""));
        assert!(matches!(bad.parse::<Config>(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn navier_stokes_requires_reynolds() {
        let ns = format!("cfl = 1.0\n{}", BASE.replace("\"euler\"", "\"navierStokes\""));
        assert!(matches!(ns.parse::<Config>(), Err(ConfigError::MissingReynolds)));
        let ns = format!("{ns}reynolds = 1e6\n");
        assert!(ns.parse::<Config>().is_ok());
    }

    #[test]
    fn boundaries_bind_to_blocks() {
        let text = format!(
            "cfl = 1.0\n{BASE}\n[[boundaries]]\nblock = 0\njLower = {{ type = \"slipWall\" }}\n\n[[boundaries]]\nblock = 3\n"
        );
        let config: Config = text.parse().unwrap();
        assert_eq!(config.boundaries[0].faces()[BlockFace::JLower.index()], BoundarySpec::SlipWall);
        assert_eq!(config.boundaries[0].faces()[BlockFace::JUpper.index()], BoundarySpec::FarField);

        let mesh = Mesh::new(vec![StructuredBlock::cartesian([2, 2, 2], [1.0; 3]).unwrap()]);
        assert!(matches!(
            config.simulation(mesh),
            Err(SolverError::Config(ConfigError::UnknownBlock { block: 3, blocks: 1 }))
        ));
    }

    #[test]
    fn grid_is_relative_to_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, "dt = 0.01\n{BASE}").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.grid, dir.path().join("box.xyz"));
        assert_eq!(config.time_step().unwrap(), TimeStep::Fixed(0.01));
    }
}

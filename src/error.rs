use std::fmt;

use thiserror::Error;

use crate::mesh::{BlockFace, ShapeError};

/// Position of a cell inside the multi-block mesh, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellLocation {
    pub block: usize,
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl CellLocation {
    pub fn new(block: usize, [i, j, k]: [usize; 3]) -> Self {
        Self { block, i, j, k }
    }
}

impl fmt::Display for CellLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {}, cell ({}, {}, {})", self.block, self.i, self.j, self.k)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read configuration file")]
    Read(#[from] std::io::Error),
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("exactly one of `dt` and `cfl` must be given and positive")]
    TimeStep,
    #[error("`iterations` and `output_frequency` must be positive")]
    Cadence,
    #[error("the Navier-Stokes equations need a positive `reference.reynolds`")]
    MissingReynolds,
    #[error("boundary conditions given for block {block}, but the mesh has {blocks} blocks")]
    UnknownBlock { block: usize, blocks: usize },
    #[error("block {block} face {face}: {reason}")]
    Interface {
        block: usize,
        face: BlockFace,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("input/output error")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("malformed PLOT3D file: {0}")]
    MalformedGrid(String),
    #[error("block {block} is malformed")]
    MalformedBlock {
        block: usize,
        #[source]
        source: ShapeError,
    },
    #[error("{at}: non-positive cell volume {volume:e}")]
    InvalidMesh { at: CellLocation, volume: f64 },
    #[error("{at}: non-physical state (density {density:e}, pressure {pressure:e})")]
    NonPhysical {
        at: CellLocation,
        density: f64,
        pressure: f64,
    },
    #[error("{at}: equation {eqn} is not finite")]
    NonFinite { at: CellLocation, eqn: usize },
    #[error("{at}: singular implicit diagonal block")]
    SingularDiagonal { at: CellLocation },
}

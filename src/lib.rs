pub mod bc;
pub mod config;
pub mod driver;
pub mod eos;
pub mod error;
pub mod flux;
pub mod implicit;
pub mod mesh;
pub mod method;
pub mod methods;
pub mod metrics;
pub mod norms;
pub mod plot3d;
pub mod problem;
pub mod sim;
pub mod solver;
pub mod state;
pub mod transport;
pub mod vector;

pub use config::Config;
pub use driver::{Driver, Logger, ObsCtx, Observer, ResidualHistory, ResidualWriter};
pub use error::{CellLocation, ConfigError, SolverError};
pub use mesh::{BlockFace, Dims, Direction, Mesh, StructuredBlock};
pub use sim::{Reference, Simulation};
pub use solver::{BlockSolver, Ctx, TimeStep};

mod error;
pub mod gpu;
pub mod grid;
pub mod kernel;
pub mod mesh;
mod palette;
pub mod rule;
pub mod rule_shader;
mod seed;
mod simulation;
mod timer;

pub use error::*;
pub use grid::{DoubleBuffer, Grid};
pub use mesh::{Face, FaceDirection, Mesh, Vertex};
pub use palette::*;
pub use rule::{RuleError, RuleSpec};
pub use seed::*;
pub use simulation::*;
pub use timer::*;

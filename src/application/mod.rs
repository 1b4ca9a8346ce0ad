pub mod leaf;
pub mod local_runner;
pub mod root;
pub mod simulation;

pub use leaf::*;
pub use local_runner::*;
pub use root::*;
pub use simulation::*;

pub mod graph;
pub mod lookup;
pub mod partition;
pub mod ports;
pub mod registry;
pub mod types;

pub use graph::*;
pub use lookup::*;
pub use partition::*;
pub use ports::*;
pub use registry::*;
pub use types::*;

pub mod factory;
pub mod record;
pub mod vehicle;

pub use factory::*;
pub use record::*;
pub use vehicle::*;

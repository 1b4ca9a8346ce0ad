pub mod coordination;
pub mod logger;
pub mod streets;
pub mod vehicles;

pub use logger::*;

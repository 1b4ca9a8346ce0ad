pub mod local_network;
pub mod tcp_network;

pub use local_network::*;
pub use tcp_network::*;

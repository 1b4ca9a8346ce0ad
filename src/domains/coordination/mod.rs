pub mod mailbox;
pub mod messages;
pub mod ports;
pub mod protocol;

pub use mailbox::*;
pub use messages::*;
pub use ports::*;
pub use protocol::*;

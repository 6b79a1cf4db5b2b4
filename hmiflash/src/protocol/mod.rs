//! Display bootloader protocol primitives.

pub mod frame;
pub mod response;

// Re-export common types
pub use frame::CommandFrame;
pub use response::{ACK, CONNECT_OK, ResponseBuffer};

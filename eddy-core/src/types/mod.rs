//! Types and traits used across Eddy
mod message;
mod time;

pub use message::{Event, Message, WindowResult};
pub use time::{Timestamp, Window};

/// Uniquely identifies a worker in a multi-threaded runtime
pub type WorkerId = u64;

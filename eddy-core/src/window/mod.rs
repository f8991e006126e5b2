//! Tumbling event time windows: assigning events to windows, accumulating values per key
//! and window and deciding when a window is complete.
mod assigner;
mod table;
mod trigger;

pub use assigner::{assign, TumblingWindows};
pub use table::AggregationTable;
pub use trigger::WindowTrigger;

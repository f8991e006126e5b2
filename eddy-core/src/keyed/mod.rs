//! Utilities for splitting a keyed stream across multiple workers.
pub mod partitioners;

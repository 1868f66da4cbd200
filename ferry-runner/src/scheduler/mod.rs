//! Scheduler layer
//!
//! Fans a stage's tasks out over the shared worker pool and gathers their
//! results behind an all-or-nothing gate.

pub mod fanout;

pub use fanout::{Coordinator, FanOutError, FanOutReport};

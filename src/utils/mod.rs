//! # Utility Modules
//!
//! Supporting utilities for time, duplicate suppression, logging, and metrics.
//!
//! ## Components
//! - **Reliability Cache**: retention-bounded dedup records for reliable messages
//! - **Time**: injectable clock and expiry checks
//! - **Logging**: structured logging configuration
//! - **Metrics**: per-server observability counters

pub mod logging;
pub mod metrics;
pub mod reliability_cache;
pub mod time;

// Re-export public types for advanced users
pub use reliability_cache::{DedupKey, ReliabilityCache};
pub use time::{Clock, ManualClock, SystemClock};

//! Observability: structured logging and counters.
//!
//! # Usage
//!
//! ```ignore
//! use chirpstore::observability::{Logger, MetricsRegistry};
//!
//! Logger::info("POST_CREATED", &[("post_id", "42")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_hits();
//! ```

mod logger;
mod metrics;

pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

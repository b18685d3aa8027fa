//! # Utility Modules
//!
//! Supporting utilities for logging and observability.
//!
//! ## Components
//! - **Logging**: subscriber setup driven by [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: thread-safe radio and command counters

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{global_metrics, Metrics, MetricsSnapshot, Timer};

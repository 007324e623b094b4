//! Logging for the rebalancer
//!
//! This module provides:
//! - Custom log formatting with bracketed output and span fields
//! - Dual logging (stderr + optional file)
//! - Log file management with timestamps

mod formatter;
mod setup;

pub use setup::setup_logging;

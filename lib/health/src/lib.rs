//! Dependency health for frontgate.
//!
//! Each [`HealthCheck`] names the readiness classes it gates with a
//! [`Probe`] mask. [`HealthAggregator`] runs the checks gating a class
//! concurrently, each under its own timeout, and folds them into a
//! [`HealthReport`] tree.

pub mod aggregator;
pub mod check;
pub mod report;
pub mod status;

pub use aggregator::HealthAggregator;
pub use check::HealthCheck;
pub use report::HealthReport;
pub use status::{Probe, Status};

//! The probe contract.

use async_trait::async_trait;

use crate::status::{Probe, Status};

/// A named dependency check.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Key under which the result appears in the report.
    fn label(&self) -> &str;

    /// Classes this check gates.
    fn probe(&self) -> Probe;

    /// Runs the check. The aggregator bounds it with a timeout.
    async fn check(&self) -> Status;
}

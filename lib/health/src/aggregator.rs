//! Concurrent, timeout-bounded evaluation of health checks.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::check::HealthCheck;
use crate::report::HealthReport;
use crate::status::{Probe, Status};

/// Runs registered checks and builds the report for one class.
#[derive(Clone)]
pub struct HealthAggregator {
    checks: Vec<Arc<dyn HealthCheck>>,
    timeout: Duration,
}

impl std::fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthAggregator")
            .field(
                "checks",
                &self.checks.iter().map(|c| c.label()).collect::<Vec<_>>(),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HealthAggregator {
    /// Creates an aggregator applying `timeout` to every check.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            checks: Vec::new(),
            timeout,
        }
    }

    #[must_use]
    pub fn with_check(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn register(&mut self, check: Arc<dyn HealthCheck>) {
        self.checks.push(check);
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evaluates every check gating `class`.
    ///
    /// Overall status is active iff every such check is active. A check that
    /// outlives the timeout counts as inactive.
    pub async fn evaluate(&self, class: Probe) -> HealthReport {
        let gating = self.checks.iter().filter(|check| check.probe().gates(class));

        let results = join_all(gating.map(|check| async move {
            let report = match tokio::time::timeout(self.timeout, check.check()).await {
                Ok(status) => HealthReport::new(status),
                Err(_) => {
                    warn!(
                        check = check.label(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "health check timed out"
                    );
                    HealthReport::new(Status::Inactive).with_message(format!(
                        "timed out after {}ms",
                        self.timeout.as_millis()
                    ))
                }
            };
            (check.label().to_string(), report)
        }))
        .await;

        let mut report = HealthReport::new(Status::Active);
        for (label, sub) in results {
            report.status = report.status.and(sub.status);
            report.subsystems.insert(label, sub);
        }
        report
    }
}

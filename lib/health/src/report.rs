//! The composite health report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::status::Status;

/// A status with optional detail and per-subsystem children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subsystems: BTreeMap<String, HealthReport>,
}

impl HealthReport {
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self {
            status,
            message: None,
            subsystems: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

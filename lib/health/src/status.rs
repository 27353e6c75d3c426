//! Status values and probe classes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Whether a subsystem is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Active,
    #[serde(rename = "KO")]
    Inactive,
}

impl Status {
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Active iff both are active.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        if self.is_active() && other.is_active() {
            Self::Active
        } else {
            Self::Inactive
        }
    }
}

impl From<bool> for Status {
    fn from(active: bool) -> Self {
        if active { Self::Active } else { Self::Inactive }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "OK"),
            Self::Inactive => write!(f, "KO"),
        }
    }
}

/// Bitmask of readiness classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Probe(u8);

impl Probe {
    /// The process can serve at all.
    pub const LIVE: Self = Self(1);
    /// The process can take traffic.
    pub const READY: Self = Self(2);

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if every class in `class` is in this mask.
    #[must_use]
    pub const fn gates(self, class: Self) -> bool {
        class.0 != 0 && self.0 & class.0 == class.0
    }
}

impl BitOr for Probe {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

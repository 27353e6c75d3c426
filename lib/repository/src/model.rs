//! The `Example` record.

use serde::{Deserialize, Serialize};

/// A named record with an age. The name is the unique key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Example {
    pub name: String,
    pub age: i64,
}

impl Example {
    #[must_use]
    pub fn new(name: impl Into<String>, age: i64) -> Self {
        Self {
            name: name.into(),
            age,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let json = serde_json::to_value(Example::new("alice", 30)).expect("serialize");
        assert_eq!(json, serde_json::json!({"name": "alice", "age": 30}));
    }
}

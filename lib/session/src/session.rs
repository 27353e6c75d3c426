//! Per-request session wrapper with mutation tracking.
//!
//! A [`Session`] is an owned copy of one backend record. Every request gets
//! its own copy; the only way to change it is through [`Session::put`] and
//! [`Session::delete`], which set the dirty flag only when the stored state
//! actually changes.

use chrono::{DateTime, Utc};
use frontgate_core::SessionId;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::record::SessionRecord;

/// Session state for one request.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    values: BTreeMap<String, Value>,
    is_new: bool,
    dirty: bool,
    destroyed: bool,
}

impl Session {
    /// Creates an empty session that has never been persisted.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            id: SessionId::new(),
            values: BTreeMap::new(),
            is_new: true,
            dirty: false,
            destroyed: false,
        }
    }

    /// Wraps a record loaded from a backend.
    #[must_use]
    pub fn from_record(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            values: record.values,
            is_new: false,
            dirty: false,
            destroyed: false,
        }
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns true if the session has never been written to a backend.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the value stored under `key` if it is a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Returns true if a value is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Stores a value.
    ///
    /// Returns true if the session changed. Writing a value equal to the
    /// current one leaves the dirty flag untouched.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        if self.values.get(&key) == Some(&value) {
            return false;
        }
        self.values.insert(key, value);
        self.dirty = true;
        true
    }

    /// Removes a value.
    ///
    /// Returns true if the session changed.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.values.remove(key).is_some() {
            self.dirty = true;
            true
        } else {
            false
        }
    }

    /// Returns true if any `put` or `delete` changed state since load or
    /// since the last successful save.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Moves the values to a new ID and returns the old one.
    ///
    /// The session becomes new and dirty, so the next save writes it under
    /// the new ID.
    pub fn regenerate(&mut self) -> SessionId {
        let previous = self.id;
        self.id = SessionId::new();
        self.is_new = true;
        self.dirty = true;
        previous
    }

    /// Marks the session for removal from the backend.
    pub fn destroy(&mut self) {
        self.values.clear();
        self.destroyed = true;
        self.dirty = true;
    }

    /// Returns true if the session was destroyed during this request.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Builds the record to persist.
    #[must_use]
    pub fn to_record(&self, expires_at: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            id: self.id,
            values: self.values.clone(),
            expires_at,
        }
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.is_new = false;
        self.dirty = false;
    }
}

//! Flat attribute map of one resource instance.
//!
//! Holds the resource id, its attributes as JSON values keyed by field name,
//! and the per-operation timeouts chosen by the user.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DEFAULT_OPERATION_TIMEOUT;
use crate::error::{Error, Result};

/// Operation a timeout applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Create,
    Delete,
}

/// User-chosen operation timeouts, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    #[serde(default)]
    id: String,
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "is_default_timeouts")]
    timeouts: Timeouts,
}

fn is_default_timeouts(t: &Timeouts) -> bool {
    *t == Timeouts::default()
}

impl ResourceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Mark the resource as gone.
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.timeouts = timeouts;
    }

    pub fn timeout(&self, kind: TimeoutKind) -> Duration {
        let secs = match kind {
            TimeoutKind::Create => self.timeouts.create,
            TimeoutKind::Delete => self.timeouts.delete,
        };
        secs.map(Duration::from_secs)
            .unwrap_or(DEFAULT_OPERATION_TIMEOUT)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    /// Typed read of an attribute. Missing and null both yield `None`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| Error::Validation(format!("attribute '{}': {}", key, e))),
        }
    }

    /// Like [`get_as`](Self::get_as), with missing attributes as the type's default.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        Ok(self.get_as(key)?.unwrap_or_default())
    }

    /// Non-empty string attribute.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Required non-empty string attribute.
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key)
            .ok_or_else(|| Error::Validation(format!("attribute '{}' is required", key)))
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.attributes.insert(key.to_string(), value);
        Ok(())
    }
}

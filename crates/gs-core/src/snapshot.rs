//! Environment bindings and best-effort snapshots for the audit trail.
//!
//! An [`Environment`] maps names to [`Binding`]s. Plain data bindings hold a
//! `serde_json::Value` and always serialize. Native bindings (functions,
//! handles, anything the check engine evaluates directly) serialize only if
//! their [`NativeValue::snapshot`] implementation offers a durable form.
//!
//! A snapshot is never read back by the session; it exists so that the
//! audit record shows which state a grade was computed against.

use crate::audit::SnapshotRecord;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A live value the check engine can use but that is not plain data.
pub trait NativeValue: fmt::Debug + Send + Sync + 'static {
    /// Short type label used in diagnostics.
    fn type_name(&self) -> &str;

    /// Lossless serialized form, or `None` when the value cannot be captured.
    fn snapshot(&self) -> Option<serde_json::Value> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// A named value in an environment.
#[derive(Debug, Clone)]
pub enum Binding {
    Data(serde_json::Value),
    Native(Arc<dyn NativeValue>),
}

impl Binding {
    pub fn data<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Binding::Data)
    }

    pub fn native<T: NativeValue>(value: T) -> Self {
        Binding::Native(Arc::new(value))
    }

    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Binding::Data(value) => Some(value),
            Binding::Native(_) => None,
        }
    }

    /// Borrow a native binding as its concrete type.
    pub fn downcast_native<T: NativeValue>(&self) -> Option<&T> {
        match self {
            Binding::Native(value) => value.as_any().downcast_ref::<T>(),
            Binding::Data(_) => None,
        }
    }

    fn snapshot_value(&self) -> Option<serde_json::Value> {
        match self {
            Binding::Data(value) => Some(value.clone()),
            Binding::Native(value) => value.snapshot(),
        }
    }
}

impl From<serde_json::Value> for Binding {
    fn from(value: serde_json::Value) -> Self {
        Binding::Data(value)
    }
}

/// Name to value mapping checks are evaluated against.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    bindings: BTreeMap<String, Binding>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, returning the previous binding if there was one.
    pub fn insert(&mut self, name: impl Into<String>, binding: impl Into<Binding>) -> Option<Binding> {
        self.bindings.insert(name.into(), binding.into())
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Binding> {
        self.bindings.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Binding names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Binding)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, Binding)>>(iter: I) -> Self {
        Environment {
            bindings: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Serialized environment plus the names that could not be captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSnapshot {
    /// JSON object of every captured binding.
    pub blob: Vec<u8>,
    /// Captured names, sorted.
    pub captured: Vec<String>,
    /// Names whose values could not be serialized, sorted.
    pub unshelved: Vec<String>,
}

impl EnvironmentSnapshot {
    /// SHA-256 of the blob (hex). This is the snapshot's reference.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.blob);
        hex::encode(hasher.finalize())
    }

    /// Decode the blob back into name/value pairs.
    pub fn values(&self) -> Result<serde_json::Map<String, serde_json::Value>, serde_json::Error> {
        serde_json::from_slice(&self.blob)
    }

    pub fn to_record(&self) -> SnapshotRecord {
        SnapshotRecord {
            sha256: self.digest(),
            blob: base64::engine::general_purpose::STANDARD.encode(&self.blob),
            captured: self.captured.clone(),
            unshelved: self.unshelved.clone(),
        }
    }
}

/// Serialize each binding independently.
///
/// A binding that cannot be serialized is left out of the blob and named in
/// `unshelved`; it never aborts the rest of the snapshot.
pub fn snapshot(env: &Environment) -> EnvironmentSnapshot {
    let mut values = serde_json::Map::new();
    let mut captured = Vec::new();
    let mut unshelved = Vec::new();

    for (name, binding) in env.iter() {
        match binding.snapshot_value() {
            Some(value) => {
                values.insert(name.to_string(), value);
                captured.push(name.to_string());
            }
            None => unshelved.push(name.to_string()),
        }
    }

    // A Map of Values with string keys always serializes.
    let blob = serde_json::to_vec(&values).unwrap_or_default();

    if !unshelved.is_empty() {
        tracing::debug!(
            captured = captured.len(),
            unshelved = ?unshelved,
            "Environment snapshot left bindings unshelved"
        );
    }

    EnvironmentSnapshot {
        blob,
        captured,
        unshelved,
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::payload::FALLBACK_SCHEMA_VERSION;

/// `{ cid: string }`, a value type. Equality and ordering are by CID string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordRef {
    pub cid: String,
}

impl RecordRef {
    pub fn new(cid: impl Into<String>) -> Self {
        RecordRef { cid: cid.into() }
    }
}

impl std::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.cid)
    }
}

/// Reconstructed from OCI manifest annotations on Lookup (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecordMeta {
    pub cid: String,
    pub schema_version: String,
    pub created_at: String,
    pub annotations: BTreeMap<String, String>,
}

impl RecordMeta {
    /// Annotations absent or corrupt: `schema_version` falls back to the
    /// compile-time constant, other fields default to empty.
    pub fn fallback(cid: impl Into<String>) -> Self {
        RecordMeta {
            cid: cid.into(),
            schema_version: FALLBACK_SCHEMA_VERSION.to_string(),
            created_at: String::new(),
            annotations: BTreeMap::new(),
        }
    }
}

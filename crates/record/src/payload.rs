//! Closed set of OASF payload variants, tagged by `schema_version`.
//!
//! Mirrors the way `AuditEvent` tags a fixed set of struct variants by
//! `event_type` — here the tag field is `schema_version` instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Fallback schema version used whenever one cannot be recovered (e.g. from
/// manifest annotations missing `schema-version`).
pub const FALLBACK_SCHEMA_VERSION: &str = "0.7.0";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModuleRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl From<&str> for ModuleRef {
    fn from(name: &str) -> Self {
        ModuleRef { name: name.to_string(), extra: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "schema_version")]
pub enum Payload {
    #[serde(rename = "0.3.1")]
    OasfV0_3_1(OasfV0_3_1),
    #[serde(rename = "0.5.0")]
    OasfV0_5_0(OasfV0_5_0),
    #[serde(rename = "0.7.0")]
    OasfV0_7_0(OasfV0_7_0),
    #[serde(rename = "1.0.0")]
    OasfV1_0_0(OasfV1_0_0),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OasfV0_3_1 {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OasfV0_5_0 {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OasfV0_7_0 {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub locators: Vec<String>,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_record_cid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OasfV1_0_0 {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub skills: Vec<ModuleRef>,
    #[serde(default)]
    pub locators: Vec<ModuleRef>,
    #[serde(default)]
    pub modules: Vec<ModuleRef>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_record_cid: Option<String>,
}

/// Version-agnostic accessor over the active payload variant (spec.md §3).
pub trait RecordData {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn description(&self) -> &str;
    fn schema_version(&self) -> &'static str;
    fn created_at(&self) -> Option<&str> {
        None
    }
    fn authors(&self) -> &[String] {
        &[]
    }
    fn skills(&self) -> Vec<String> {
        Vec::new()
    }
    fn locators(&self) -> Vec<String> {
        Vec::new()
    }
    fn modules(&self) -> Vec<String> {
        Vec::new()
    }
    fn domains(&self) -> &[String] {
        &[]
    }
    fn annotations(&self) -> &BTreeMap<String, String> {
        empty_annotations()
    }
    fn previous_record_cid(&self) -> Option<&str> {
        None
    }
}

fn empty_annotations() -> &'static BTreeMap<String, String> {
    use std::sync::OnceLock;
    static MAP: OnceLock<BTreeMap<String, String>> = OnceLock::new();
    MAP.get_or_init(BTreeMap::new)
}

impl RecordData for Payload {
    fn name(&self) -> &str {
        match self {
            Payload::OasfV0_3_1(p) => &p.name,
            Payload::OasfV0_5_0(p) => &p.name,
            Payload::OasfV0_7_0(p) => &p.name,
            Payload::OasfV1_0_0(p) => &p.name,
        }
    }

    fn version(&self) -> &str {
        match self {
            Payload::OasfV0_3_1(p) => &p.version,
            Payload::OasfV0_5_0(p) => &p.version,
            Payload::OasfV0_7_0(p) => &p.version,
            Payload::OasfV1_0_0(p) => &p.version,
        }
    }

    fn description(&self) -> &str {
        match self {
            Payload::OasfV0_3_1(p) => &p.description,
            Payload::OasfV0_5_0(p) => &p.description,
            Payload::OasfV0_7_0(p) => &p.description,
            Payload::OasfV1_0_0(p) => &p.description,
        }
    }

    fn schema_version(&self) -> &'static str {
        match self {
            Payload::OasfV0_3_1(_) => "0.3.1",
            Payload::OasfV0_5_0(_) => "0.5.0",
            Payload::OasfV0_7_0(_) => "0.7.0",
            Payload::OasfV1_0_0(_) => "1.0.0",
        }
    }

    fn created_at(&self) -> Option<&str> {
        match self {
            Payload::OasfV0_7_0(p) => p.created_at.as_deref(),
            Payload::OasfV1_0_0(p) => p.created_at.as_deref(),
            _ => None,
        }
    }

    fn authors(&self) -> &[String] {
        match self {
            Payload::OasfV0_5_0(p) => &p.authors,
            Payload::OasfV0_7_0(p) => &p.authors,
            Payload::OasfV1_0_0(p) => &p.authors,
            Payload::OasfV0_3_1(_) => &[],
        }
    }

    fn skills(&self) -> Vec<String> {
        match self {
            Payload::OasfV0_5_0(p) => p.skills.clone(),
            Payload::OasfV0_7_0(p) => p.skills.clone(),
            Payload::OasfV1_0_0(p) => p.skills.iter().map(|m| m.name.clone()).collect(),
            Payload::OasfV0_3_1(_) => Vec::new(),
        }
    }

    fn locators(&self) -> Vec<String> {
        match self {
            Payload::OasfV0_7_0(p) => p.locators.clone(),
            Payload::OasfV1_0_0(p) => p.locators.iter().map(|m| m.name.clone()).collect(),
            _ => Vec::new(),
        }
    }

    fn modules(&self) -> Vec<String> {
        match self {
            Payload::OasfV0_7_0(p) => p.modules.clone(),
            Payload::OasfV1_0_0(p) => p.modules.iter().map(|m| m.name.clone()).collect(),
            _ => Vec::new(),
        }
    }

    fn domains(&self) -> &[String] {
        match self {
            Payload::OasfV0_7_0(p) => &p.domains,
            Payload::OasfV1_0_0(p) => &p.domains,
            _ => &[],
        }
    }

    fn annotations(&self) -> &BTreeMap<String, String> {
        match self {
            Payload::OasfV0_7_0(p) => &p.annotations,
            Payload::OasfV1_0_0(p) => &p.annotations,
            _ => empty_annotations(),
        }
    }

    fn previous_record_cid(&self) -> Option<&str> {
        match self {
            Payload::OasfV0_7_0(p) => p.previous_record_cid.as_deref(),
            Payload::OasfV1_0_0(p) => p.previous_record_cid.as_deref(),
            _ => None,
        }
    }
}

/// Parse a schema version string that may arrive from manifest annotations
/// (which have no tag field of their own) into a `Payload`, given the raw
/// untagged fields as a `serde_json::Value`.
pub fn payload_for_schema_version(
    schema_version: &str,
    mut fields: serde_json::Value,
) -> Result<Payload, RecordError> {
    if let serde_json::Value::Object(map) = &mut fields {
        map.insert(
            "schema_version".to_string(),
            serde_json::Value::String(schema_version.to_string()),
        );
    }
    serde_json::from_value(fields).map_err(|e| RecordError::UnsupportedAlgorithm {
        version: format!("{schema_version} ({e})"),
    })
}

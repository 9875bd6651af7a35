//! Manifest annotation schema (`org.agntcy.dir/*`, spec.md §4.2) and the
//! Record ⇄ RecordMeta round trip (spec.md §8, universal property 7).

use std::collections::BTreeMap;

use crate::meta::RecordMeta;
use crate::payload::{RecordData, FALLBACK_SCHEMA_VERSION};
use crate::record::Record;

const NS: &str = "org.agntcy.dir";

pub fn annotation_key(name: &str) -> String {
    format!("{NS}/{name}")
}

pub fn custom_annotation_key(key: &str) -> String {
    format!("{NS}/custom.{key}")
}

/// Encode a record's structured metadata as OCI manifest annotations.
pub fn record_to_annotations(record: &Record) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    out.insert(annotation_key("type"), "record".to_string());
    out.insert(annotation_key("oasf-version"), record.schema_version().to_string());
    out.insert(annotation_key("name"), record.name().to_string());
    out.insert(annotation_key("version"), record.version().to_string());
    out.insert(annotation_key("description"), record.description().to_string());
    out.insert(annotation_key("schema-version"), record.schema_version().to_string());
    if let Some(created_at) = record.created_at() {
        out.insert(annotation_key("created-at"), created_at.to_string());
    }
    if !record.authors().is_empty() {
        out.insert(annotation_key("authors"), record.authors().join(","));
    }
    if let Some(previous) = record.previous_record_cid() {
        out.insert(annotation_key("previous-cid"), previous.to_string());
    }
    if let Some(payload) = record.payload() {
        for (k, v) in payload.annotations() {
            out.insert(custom_annotation_key(k), v.clone());
        }
    }
    out
}

/// Parse manifest annotations into a `RecordMeta`. Missing `schema-version`
/// falls back to the compile-time constant; missing/corrupt annotations
/// otherwise default to empty, never fail.
pub fn annotations_to_meta(cid: impl Into<String>, annotations: &BTreeMap<String, String>) -> RecordMeta {
    let schema_version = annotations
        .get(&annotation_key("schema-version"))
        .cloned()
        .unwrap_or_else(|| FALLBACK_SCHEMA_VERSION.to_string());
    let created_at = annotations
        .get(&annotation_key("created-at"))
        .cloned()
        .unwrap_or_default();

    let mut meta_annotations = BTreeMap::new();
    if let Some(name) = annotations.get(&annotation_key("name")) {
        meta_annotations.insert("name".to_string(), name.clone());
    }
    if let Some(version) = annotations.get(&annotation_key("version")) {
        meta_annotations.insert("version".to_string(), version.clone());
    }
    if let Some(oasf_version) = annotations.get(&annotation_key("oasf-version")) {
        meta_annotations.insert("oasf-version".to_string(), oasf_version.clone());
    }
    let prefix = custom_annotation_key("");
    for (k, v) in annotations {
        if let Some(custom_key) = k.strip_prefix(&prefix) {
            meta_annotations.insert(custom_key.to_string(), v.clone());
        }
    }

    RecordMeta {
        cid: cid.into(),
        schema_version,
        created_at,
        annotations: meta_annotations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{OasfV0_7_0, Payload};

    #[test]
    fn s4_round_trip_annotations() {
        let mut annotations = BTreeMap::new();
        annotations.insert("custom".to_string(), "value".to_string());

        let record = Record::new(Payload::OasfV0_7_0(OasfV0_7_0 {
            name: "roundtrip-agent".into(),
            version: "1.0.0".into(),
            created_at: Some("2023-01-01T00:00:00Z".into()),
            annotations,
            ..Default::default()
        }));

        let manifest_annotations = record_to_annotations(&record);
        assert_eq!(manifest_annotations[&annotation_key("name")], "roundtrip-agent");
        assert_eq!(manifest_annotations[&annotation_key("version")], "1.0.0");
        assert_eq!(manifest_annotations[&annotation_key("schema-version")], "0.7.0");
        assert_eq!(
            manifest_annotations[&annotation_key("created-at")],
            "2023-01-01T00:00:00Z"
        );
        assert_eq!(manifest_annotations[&custom_annotation_key("custom")], "value");

        let meta = annotations_to_meta("bafy...", &manifest_annotations);
        assert_eq!(meta.schema_version, "0.7.0");
        assert_eq!(meta.created_at, "2023-01-01T00:00:00Z");
        assert_eq!(meta.annotations["name"], "roundtrip-agent");
        assert_eq!(meta.annotations["version"], "1.0.0");
        assert_eq!(meta.annotations["oasf-version"], "0.7.0");
        assert_eq!(meta.annotations["custom"], "value");
    }

    #[test]
    fn missing_schema_version_falls_back_to_constant() {
        let meta = annotations_to_meta("cid", &BTreeMap::new());
        assert_eq!(meta.schema_version, FALLBACK_SCHEMA_VERSION);
        assert_eq!(meta.created_at, "");
    }
}

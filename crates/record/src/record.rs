use std::sync::Mutex;

use agdir_common::{cid_string_from_canonical_bytes, canonical_json_bytes};

use crate::error::RecordError;
use crate::payload::{payload_for_schema_version, Payload, RecordData};

/// Schema-version-agnostic record envelope (spec.md §3). Either empty (no
/// payload — invalid for CID/validation) or carries exactly one payload
/// variant.
#[derive(Debug)]
pub struct Record {
    payload: Option<Payload>,
    cid_cache: Mutex<Option<String>>,
}

impl Clone for Record {
    fn clone(&self) -> Self {
        Record {
            payload: self.payload.clone(),
            cid_cache: Mutex::new(self.cid_cache.lock().unwrap().clone()),
        }
    }
}

impl Record {
    /// Construct a record from any supported typed payload.
    pub fn new(payload: Payload) -> Self {
        Record {
            payload: Some(payload),
            cid_cache: Mutex::new(None),
        }
    }

    /// A record with no payload. Invalid for CID derivation and validation,
    /// but never panics when queried.
    pub fn empty() -> Self {
        Record {
            payload: None,
            cid_cache: Mutex::new(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Mutable access to the active payload, e.g. for enrichment hooks that
    /// replace `skills` in place. Invalidates the cached CID, since the
    /// caller may have changed the bytes the CID is derived from.
    pub fn payload_mut(&mut self) -> Option<&mut Payload> {
        *self.cid_cache.get_mut().unwrap() = None;
        self.payload.as_mut()
    }

    /// Parse canonical JSON, detect the schema version from the
    /// `schema_version` field, and instantiate the matching variant.
    ///
    /// Fails `InvalidInput` when `bytes` is not JSON, `UnsupportedAlgorithm`
    /// for an unrecognized schema version.
    pub fn unmarshal_record(bytes: &[u8]) -> Result<Record, RecordError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| RecordError::invalid_input(format!("not valid JSON: {e}")))?;

        let schema_version = value
            .get("schema_version")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RecordError::invalid_input("missing schema_version field"))?
            .to_string();

        let payload = payload_for_schema_version(&schema_version, value)?;
        Ok(Record::new(payload))
    }

    /// Canonical JSON bytes of the active variant: marshal to JSON, re-parse
    /// to a generic value, re-marshal with lexicographically sorted map keys.
    /// The double pass is mandatory for cross-implementation determinism.
    pub fn marshal_canonical(&self) -> Result<Vec<u8>, RecordError> {
        let payload = self
            .payload
            .as_ref()
            .ok_or_else(|| RecordError::invalid_input("cannot marshal an empty record"))?;
        Ok(canonical_json_bytes(payload)?)
    }

    /// Returns the cached CIDv1 string, computing it if unset. A nil or
    /// empty record returns the empty string; never panics (spec.md §4.1,
    /// universal property 4).
    pub fn get_cid(&self) -> String {
        if self.payload.is_none() {
            return String::new();
        }
        {
            let cache = self.cid_cache.lock().unwrap();
            if let Some(cid) = cache.as_ref() {
                return cid.clone();
            }
        }
        let cid = match self.marshal_canonical().and_then(|bytes| {
            cid_string_from_canonical_bytes(&bytes).map_err(RecordError::from)
        }) {
            Ok(cid) => cid,
            Err(_) => return String::new(),
        };
        *self.cid_cache.lock().unwrap() = Some(cid.clone());
        cid
    }

    /// Panics on error; the empty-record/empty-string case is not an error
    /// so this only panics on a canonicalization failure, which cannot
    /// happen for an already-constructed payload.
    pub fn must_get_cid(&self) -> String {
        let cid = self.get_cid();
        if cid.is_empty() && self.payload.is_some() {
            panic!("failed to compute CID for non-empty record");
        }
        cid
    }
}

impl RecordData for Record {
    fn name(&self) -> &str {
        self.payload.as_ref().map(|p| p.name()).unwrap_or("")
    }

    fn version(&self) -> &str {
        self.payload.as_ref().map(|p| p.version()).unwrap_or("")
    }

    fn description(&self) -> &str {
        self.payload.as_ref().map(|p| p.description()).unwrap_or("")
    }

    fn schema_version(&self) -> &'static str {
        self.payload.as_ref().map(|p| p.schema_version()).unwrap_or("")
    }

    fn created_at(&self) -> Option<&str> {
        self.payload.as_ref().and_then(|p| p.created_at())
    }

    fn authors(&self) -> &[String] {
        self.payload.as_ref().map(|p| p.authors()).unwrap_or(&[])
    }

    fn skills(&self) -> Vec<String> {
        self.payload.as_ref().map(|p| p.skills()).unwrap_or_default()
    }

    fn locators(&self) -> Vec<String> {
        self.payload.as_ref().map(|p| p.locators()).unwrap_or_default()
    }

    fn modules(&self) -> Vec<String> {
        self.payload.as_ref().map(|p| p.modules()).unwrap_or_default()
    }

    fn domains(&self) -> &[String] {
        self.payload.as_ref().map(|p| p.domains()).unwrap_or(&[])
    }

    fn previous_record_cid(&self) -> Option<&str> {
        self.payload.as_ref().and_then(|p| p.previous_record_cid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::OasfV0_7_0;

    fn test_agent(schema_version: &str) -> Record {
        match schema_version {
            "0.3.1" => Record::new(Payload::OasfV0_3_1(crate::payload::OasfV0_3_1 {
                name: "test-agent".into(),
                version: String::new(),
                description: String::new(),
            })),
            "0.7.0" => Record::new(Payload::OasfV0_7_0(OasfV0_7_0 {
                name: "test-agent".into(),
                description: "A test agent".into(),
                ..Default::default()
            })),
            other => panic!("unsupported test schema version {other}"),
        }
    }

    #[test]
    fn s1_cid_determinism_across_replicates() {
        let r1 = test_agent("0.7.0");
        let r2 = test_agent("0.7.0");
        let cid1 = r1.get_cid();
        let cid2 = r2.get_cid();
        assert_eq!(cid1, cid2);
        assert!(!cid1.is_empty());
        assert!(cid1.len() > 10);
    }

    #[test]
    fn s2_cid_differs_across_schema_versions() {
        let r1 = test_agent("0.3.1");
        let r2 = test_agent("0.7.0");
        let cid1 = r1.get_cid();
        let cid2 = r2.get_cid();
        assert!(!cid1.is_empty());
        assert!(!cid2.is_empty());
        assert_ne!(cid1, cid2);
    }

    #[test]
    fn empty_record_cid_is_empty_string_never_panics() {
        let r = Record::empty();
        assert_eq!(r.get_cid(), "");
    }

    #[test]
    fn cid_is_cached_after_first_access() {
        let r = test_agent("0.7.0");
        let a = r.get_cid();
        let b = r.get_cid();
        assert_eq!(a, b);
    }

    #[test]
    fn unmarshal_record_rejects_unknown_schema_version() {
        let bytes = br#"{"schema_version":"9.9.9","name":"x"}"#;
        let err = Record::unmarshal_record(bytes).unwrap_err();
        assert!(matches!(err, RecordError::UnsupportedAlgorithm { .. }));
    }

    #[test]
    fn unmarshal_record_rejects_non_json() {
        let err = Record::unmarshal_record(b"not json").unwrap_err();
        assert!(matches!(err, RecordError::InvalidInput { .. }));
    }
}

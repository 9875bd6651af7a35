//! agdir_common
//!
//! Canonical JSON serialization, SHA-256 hashing, and CIDv1 derivation shared
//! by every other crate in the workspace. This exists to guarantee
//! determinism for:
//! - record content addressing (CID)
//! - OCI manifest/blob digests
//! - signature payloads
//!
//! IMPORTANT: Do not "pretty print". CIDs and digests are computed over
//! canonical bytes only.

use std::collections::BTreeMap;

use cid::Cid;
use multihash::Multihash;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Raw binary codec (multicodec `0x55`), per spec: CIDv1 records carry raw
/// canonical JSON bytes, not a structured codec like dag-cbor or dag-json.
pub const RAW_CODEC: u64 = 0x55;

/// `sha2-256` multihash code (multicodec `0x12`). The only digest algorithm
/// this engine supports.
pub const SHA2_256_CODE: u64 = 0x12;

const SHA2_256_SIZE: usize = 32;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("invalid input: {message}")]
    InvalidInput {
        message: String,
        details: BTreeMap<String, String>,
    },
    #[error("invalid cid: {message}")]
    InvalidCid { message: String },
    #[error("invalid digest: {message}")]
    InvalidDigest { message: String },
    #[error("unsupported algorithm: {message}")]
    UnsupportedAlgorithm { message: String },
    #[error("hash creation failed: {message}")]
    HashCreationFailed { message: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CommonError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CommonError::InvalidInput {
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let CommonError::InvalidInput { details, .. } = &mut self {
            details.insert(key.into(), value.into());
        }
        self
    }
}

/// Shared error-kind taxonomy (spec §7), used by every higher crate to map
/// its own `thiserror` enum onto a gRPC-style status class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    InvalidCid,
    InvalidDigest,
    UnsupportedAlgorithm,
    NotFound,
    Conflict,
    TransientNetwork,
    Cancelled,
    DeadlineExceeded,
    ValidationFailed,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::InvalidCid => "InvalidCid",
            ErrorKind::InvalidDigest => "InvalidDigest",
            ErrorKind::UnsupportedAlgorithm => "UnsupportedAlgorithm",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::TransientNetwork => "TransientNetwork",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::DeadlineExceeded => "DeadlineExceeded",
            ErrorKind::ValidationFailed => "ValidationFailed",
            ErrorKind::Internal => "Internal",
        }
    }

    /// Whether an operation carrying this kind may be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::TransientNetwork)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ----------------------------
// Canonical JSON
// ----------------------------

/// Serialize to canonical JSON bytes:
/// - stable key ordering (enforced via a `Value` roundtrip)
/// - no whitespace
/// - UTF-8, no trailing newline
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CommonError> {
    let v = serde_json::to_value(value)?;
    let sorted = sort_json_value(v);
    Ok(serde_json::to_vec(&sorted)?)
}

fn sort_json_value(v: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in entries {
                out.insert(k, sort_json_value(v));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(sort_json_value).collect()),
        other => other,
    }
}

// ----------------------------
// SHA-256
// ----------------------------

/// Raw 32-byte SHA-256 digest.
pub fn sha256_digest(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Return `"sha256:<hex>"` of raw bytes, the OCI descriptor digest form.
pub fn sha256_oci_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(sha256_digest(bytes)))
}

/// Return `"sha256:<hex>"` of canonical JSON of `value`.
pub fn sha256_canonical_json<T: Serialize>(value: &T) -> Result<String, CommonError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(sha256_oci_digest(&bytes))
}

// ----------------------------
// CIDv1
// ----------------------------

/// Derive a CIDv1 (raw codec, sha2-256) from already-canonical bytes.
pub fn cid_from_canonical_bytes(bytes: &[u8]) -> Result<Cid, CommonError> {
    let digest = sha256_digest(bytes);
    let multihash = Multihash::<64>::wrap(SHA2_256_CODE, &digest)
        .map_err(|e| CommonError::HashCreationFailed { message: e.to_string() })?;
    Ok(Cid::new_v1(RAW_CODEC, multihash))
}

/// Derive the base32-lowercase CIDv1 string form from already-canonical bytes.
pub fn cid_string_from_canonical_bytes(bytes: &[u8]) -> Result<String, CommonError> {
    Ok(cid_from_canonical_bytes(bytes)?.to_string())
}

/// Convert an OCI SHA-256 descriptor digest (`"sha256:<hex>"` or bare hex) to
/// the equivalent CIDv1 string. Only `sha2-256` is supported.
pub fn digest_to_cid(digest: &str) -> Result<String, CommonError> {
    let (algo, hex_digest) = split_digest(digest);
    if algo != "sha256" {
        return Err(CommonError::UnsupportedAlgorithm {
            message: format!("unsupported digest algorithm: {algo}"),
        });
    }
    let raw = hex::decode(hex_digest)
        .map_err(|e| CommonError::InvalidDigest { message: e.to_string() })?;
    if raw.len() != SHA2_256_SIZE {
        return Err(CommonError::InvalidDigest {
            message: format!("expected {SHA2_256_SIZE}-byte digest, got {}", raw.len()),
        });
    }
    let multihash = Multihash::<64>::wrap(SHA2_256_CODE, &raw)
        .map_err(|e| CommonError::HashCreationFailed { message: e.to_string() })?;
    Ok(Cid::new_v1(RAW_CODEC, multihash).to_string())
}

/// Convert a CIDv1 string back to its OCI-style SHA-256 digest
/// (`"sha256:<hex>"`). Fails with `UnsupportedAlgorithm` for any multihash
/// code other than `sha2-256`.
pub fn cid_to_digest(cid_str: &str) -> Result<String, CommonError> {
    let cid = Cid::try_from(cid_str).map_err(|e| CommonError::InvalidCid { message: e.to_string() })?;
    let mh = cid.hash();
    if mh.code() != SHA2_256_CODE {
        return Err(CommonError::UnsupportedAlgorithm {
            message: format!("unsupported multihash code: {:#x}", mh.code()),
        });
    }
    Ok(format!("sha256:{}", hex::encode(mh.digest())))
}

fn split_digest(digest: &str) -> (&str, &str) {
    match digest.split_once(':') {
        Some((algo, hex_digest)) => (algo, hex_digest),
        None => ("sha256", digest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Obj {
        b: u32,
        a: u32,
    }

    #[test]
    fn canonical_hash_is_stable_under_key_reordering() {
        let x = Obj { b: 2, a: 1 };
        let y = Obj { a: 1, b: 2 };
        assert_eq!(sha256_canonical_json(&x).unwrap(), sha256_canonical_json(&y).unwrap());
    }

    #[test]
    fn digest_cid_round_trips_for_sha256() {
        let digest = sha256_oci_digest(b"hello world");
        let cid = digest_to_cid(&digest).unwrap();
        let back = cid_to_digest(&cid).unwrap();
        assert_eq!(digest, back);
    }

    #[test]
    fn digest_to_cid_rejects_non_sha256() {
        let err = digest_to_cid("sha1:aabbcc").unwrap_err();
        assert!(matches!(err, CommonError::UnsupportedAlgorithm { .. }));
    }

    #[test]
    fn cid_from_bytes_is_deterministic() {
        let a = cid_string_from_canonical_bytes(b"{}").unwrap();
        let b = cid_string_from_canonical_bytes(b"{}").unwrap();
        assert_eq!(a, b);
        assert!(a.len() > 10);
    }
}

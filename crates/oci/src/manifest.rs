//! OCI image manifest shape used to package one record (spec.md §4.2, §6).

use std::collections::BTreeMap;

use agdir_common::sha256_oci_digest;
use agdir_record::Record;
use serde::{Deserialize, Serialize};

pub const RECORD_MEDIA_TYPE: &str = "application/json";
pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Descriptor {
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Descriptor {
    pub fn for_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        Descriptor {
            media_type: media_type.into(),
            digest: sha256_oci_digest(bytes),
            size: bytes.len() as u64,
            annotations: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub media_type: String,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Present only for referrer (signature/public-key) manifests: links
    /// back to the host record manifest (spec.md §9, "Referrer storage").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Descriptor>,
}

impl Manifest {
    /// Build the manifest for a pushed record: config descriptor over the
    /// canonical JSON blob, empty layers, annotations from the record's
    /// metadata (spec.md §4.2).
    pub fn for_record(
        record_bytes: &[u8],
        annotations: BTreeMap<String, String>,
    ) -> Manifest {
        Manifest {
            schema_version: 2,
            media_type: MANIFEST_MEDIA_TYPE.to_string(),
            config: Descriptor::for_bytes(RECORD_MEDIA_TYPE, record_bytes),
            layers: Vec::new(),
            annotations,
            subject: None,
        }
    }

    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Referrer kind (spec.md §3: "Concrete kinds: `signature` and `public-key`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferrerKind {
    Signature,
    PublicKey,
}

impl ReferrerKind {
    pub fn media_type(&self) -> &'static str {
        match self {
            ReferrerKind::Signature => "application/vnd.agntcy.dir.signature.v1+json",
            ReferrerKind::PublicKey => "application/vnd.agntcy.dir.publickey.v1+json",
        }
    }

    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            "application/vnd.agntcy.dir.signature.v1+json" => Some(ReferrerKind::Signature),
            "application/vnd.agntcy.dir.publickey.v1+json" => Some(ReferrerKind::PublicKey),
            _ => None,
        }
    }
}

/// An opaque binary artifact attached to a host record (spec.md §3:
/// "`RecordReferrer`: an opaque binary artifact tagged by a media type
/// string").
#[derive(Debug, Clone)]
pub struct ReferrerArtifact {
    pub kind: ReferrerKind,
    pub bytes: Vec<u8>,
    pub annotations: BTreeMap<String, String>,
}

impl ReferrerArtifact {
    pub fn new(kind: ReferrerKind, bytes: Vec<u8>) -> Self {
        ReferrerArtifact { kind, bytes, annotations: BTreeMap::new() }
    }

    pub fn manifest_for(&self, subject: &Descriptor) -> Manifest {
        Manifest {
            schema_version: 2,
            media_type: MANIFEST_MEDIA_TYPE.to_string(),
            config: Descriptor::for_bytes(self.kind.media_type(), &self.bytes),
            layers: Vec::new(),
            annotations: self.annotations.clone(),
            subject: Some(subject.clone()),
        }
    }
}

pub fn record_bytes_and_annotations(
    record: &Record,
) -> Result<(Vec<u8>, BTreeMap<String, String>), agdir_record::RecordError> {
    let bytes = record.marshal_canonical()?;
    let annotations = agdir_record::record_to_annotations(record);
    Ok((bytes, annotations))
}

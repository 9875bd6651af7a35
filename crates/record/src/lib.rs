//! agdir_record
//!
//! Schema-version-agnostic record envelope, the closed set of OASF payload
//! variants, CID caching, and the validation contract. Built on
//! `agdir_common` for canonical JSON and CIDv1 derivation.

mod annotations;
mod error;
mod meta;
mod payload;
mod record;
mod validation;

pub use annotations::{annotation_key, annotations_to_meta, custom_annotation_key, record_to_annotations};
pub use error::RecordError;
pub use meta::{RecordMeta, RecordRef};
pub use payload::{
    payload_for_schema_version, ModuleRef, OasfV0_3_1, OasfV0_5_0, OasfV0_7_0, OasfV1_0_0, Payload,
    RecordData, FALLBACK_SCHEMA_VERSION,
};
pub use record::Record;
pub use validation::{validate_record, ApiValidator, NoopValidator, ValidationConfig, MAX_RECORD_BYTES};

//! agdir_oci
//!
//! OCI storage engine (spec.md §4.2): push/lookup/pull/delete of records as
//! OCI manifests, the annotation schema, referrer push/walk, and
//! tag-retry under concurrency. Backends are selected by configuration —
//! `LocalDir` for tests/mounted volumes, `GenericRegistry`/`ZotRegistry` for
//! a remote OCI Distribution Spec registry.

mod backend;
mod error;
mod local_dir;
mod manifest;
mod remote;
mod retry;

pub use backend::StoreBackend;
pub use error::OciError;
pub use local_dir::LocalDir;
pub use manifest::{
    record_bytes_and_annotations, Descriptor, Manifest, ReferrerArtifact, ReferrerKind,
    MANIFEST_MEDIA_TYPE, RECORD_MEDIA_TYPE,
};
pub use remote::{GenericRegistry, RegistryAuthConfig, ZotRegistry};
pub use retry::{retry_tag, INITIAL_BACKOFF, MAX_BACKOFF, MAX_RETRIES};

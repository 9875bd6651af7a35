use async_trait::async_trait;

use agdir_record::{Record, RecordMeta, RecordRef};

use crate::error::OciError;
use crate::manifest::{ReferrerArtifact, ReferrerKind};

/// Pluggable OCI storage backend (spec.md §9: "model as an interface
/// `StoreBackend` with implementations `LocalDir`, `Generic`, `Zot`"). The
/// core never branches on backend type outside these implementations.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn push(&self, record: &Record) -> Result<RecordRef, OciError>;

    async fn lookup(&self, r: &RecordRef) -> Result<RecordMeta, OciError>;

    async fn pull(&self, r: &RecordRef) -> Result<Record, OciError>;

    async fn delete(&self, r: &RecordRef) -> Result<(), OciError>;

    async fn push_referrer(&self, host: &RecordRef, referrer: ReferrerArtifact) -> Result<(), OciError>;

    /// Walk all referrers of `kind` (or all kinds, if `None`) attached to
    /// `host_cid`. Walking order is unspecified but deterministic per
    /// registry state (spec.md §4.2).
    async fn walk_referrers(
        &self,
        host_cid: &str,
        kind: Option<ReferrerKind>,
        f: &mut (dyn FnMut(ReferrerArtifact) -> Result<(), OciError> + Send),
    ) -> Result<(), OciError>;

    async fn pull_referrers(
        &self,
        host_cid: &str,
        kind: Option<ReferrerKind>,
    ) -> Result<Vec<ReferrerArtifact>, OciError> {
        let mut out = Vec::new();
        self.walk_referrers(host_cid, kind, &mut |artifact| {
            out.push(artifact);
            Ok(())
        })
        .await?;
        Ok(out)
    }

    async fn is_ready(&self) -> Result<bool, OciError>;
}

//! Signature verification reconciler (spec.md §4.6, background task,
//! optional): periodically re-verifies records whose cached verification
//! outcome is stale.
//!
//! The cache itself is a small file-based index, generalized from
//! `crates/episodes`' deterministic index+query store: one JSON file,
//! rewritten atomically, keyed by CID instead of by tick/thread.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use agdir_oci::{StoreBackend, ZotRegistry};

use crate::error::SignError;
use crate::service::verify_cid;
use crate::signer::Verifier;

pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_PER_RECORD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCacheEntry {
    pub cid: String,
    pub trusted: bool,
    pub checked_at_unix: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct VerificationCacheFile {
    entries: BTreeMap<String, VerificationCacheEntry>,
}

pub struct VerificationCache {
    path: PathBuf,
}

impl VerificationCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        VerificationCache { path: path.into() }
    }

    fn load(&self) -> Result<VerificationCacheFile, SignError> {
        if !self.path.exists() {
            return Ok(VerificationCacheFile::default());
        }
        let bytes = fs::read(&self.path).map_err(|e| SignError::VerificationFailed(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| SignError::VerificationFailed(e.to_string()))
    }

    fn write(&self, file: &VerificationCacheFile) -> Result<(), SignError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SignError::VerificationFailed(e.to_string()))?;
        }
        let bytes = agdir_common::canonical_json_bytes(file).map_err(|e| SignError::VerificationFailed(e.to_string()))?;
        fs::write(&self.path, bytes).map_err(|e| SignError::VerificationFailed(e.to_string()))
    }

    pub fn upsert(&self, cid: &str, trusted: bool, now_unix: u64) -> Result<(), SignError> {
        let mut file = self.load()?;
        file.entries.insert(
            cid.to_string(),
            VerificationCacheEntry { cid: cid.to_string(), trusted, checked_at_unix: now_unix },
        );
        self.write(&file)
    }

    /// Records whose entry is missing or older than `ttl` relative to `now`.
    pub fn stale_cids(&self, known_cids: &[String], ttl: Duration, now_unix: u64) -> Result<Vec<String>, SignError> {
        let file = self.load()?;
        Ok(known_cids
            .iter()
            .filter(|cid| match file.entries.get(*cid) {
                None => true,
                Some(entry) => now_unix.saturating_sub(entry.checked_at_unix) > ttl.as_secs(),
            })
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub ttl: Duration,
    pub per_record_timeout: Duration,
    pub interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig {
            ttl: DEFAULT_TTL,
            per_record_timeout: DEFAULT_PER_RECORD_TIMEOUT,
            interval: Duration::from_secs(60 * 60),
        }
    }
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Run one reconciliation pass over `known_cids`, upserting the cache for
/// each stale entry. Returns the number of records re-verified.
pub async fn run_once(
    cache: &VerificationCache,
    known_cids: &[String],
    backend: &dyn StoreBackend,
    zot: Option<&ZotRegistry>,
    verifier: &dyn Verifier,
    config: &ReconcilerConfig,
) -> Result<usize, SignError> {
    let now = now_unix();
    let stale = cache.stale_cids(known_cids, config.ttl, now)?;
    let mut reconciled = 0;

    for cid in stale {
        let trusted = match tokio::time::timeout(config.per_record_timeout, verify_cid(backend, zot, &cid, verifier)).await {
            Ok(Ok(trusted)) => trusted,
            Ok(Err(e)) => {
                tracing::warn!(cid = %cid, error = %e, "reconciler verify failed");
                false
            }
            Err(_) => {
                tracing::warn!(cid = %cid, "reconciler verify timed out");
                false
            }
        };
        cache.upsert(&cid, trusted, now_unix())?;
        reconciled += 1;
    }

    Ok(reconciled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_cids_includes_unseen_and_expired() {
        let td = tempfile::TempDir::new().unwrap();
        let cache = VerificationCache::new(td.path().join("verification_cache.json"));
        cache.upsert("cid-fresh", true, 1_000).unwrap();
        cache.upsert("cid-stale", true, 0).unwrap();

        let stale = cache
            .stale_cids(
                &["cid-fresh".into(), "cid-stale".into(), "cid-unseen".into()],
                Duration::from_secs(500),
                1_000,
            )
            .unwrap();

        assert!(stale.contains(&"cid-stale".to_string()));
        assert!(stale.contains(&"cid-unseen".to_string()));
        assert!(!stale.contains(&"cid-fresh".to_string()));
    }
}

//! DedupChecker (spec.md §4.5, stage 2, optional): an in-memory
//! `name@version -> CID` cache built once at construction by paginating the
//! existing registry contents, then consulted (read-only) while filtering
//! fetched items.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use agdir_client::{DirectoryClient, SearchQuery};
use agdir_oci::StoreBackend;
use agdir_record::{RecordData, RecordRef};

use crate::error::ImporterError;
use crate::source::SourceItem;

pub const DEDUP_BATCH_SIZE: u32 = 1000;
pub const DEDUP_SAFETY_CEILING: usize = 50_000;

pub struct DedupChecker {
    cache: RwLock<HashMap<String, String>>,
}

impl DedupChecker {
    /// Builds the cache by issuing paginated `SearchCIDs` for each identity
    /// module, then `PullBatch` to materialize `name@version` (spec.md
    /// §4.5). Stops early, with a warning, once the safety ceiling is hit.
    pub async fn build<B>(client: &DirectoryClient<B>, identity_modules: &[&str]) -> Result<Self, ImporterError>
    where
        B: StoreBackend + ?Sized + 'static,
    {
        let mut cache = HashMap::new();

        'modules: for module in identity_modules {
            let queries = vec![SearchQuery::module_name(*module)];
            let mut offset: u32 = 0;

            loop {
                let mut rx = client.search_cids(queries.clone(), Some(DEDUP_BATCH_SIZE), Some(offset));
                let mut cids = Vec::new();
                while let Some(item) = rx.recv().await {
                    cids.push(item?);
                }
                if cids.is_empty() {
                    break;
                }

                let page_len = cids.len();
                let refs: Vec<RecordRef> = cids.into_iter().map(RecordRef::new).collect();
                let records = client.pull_batch(refs).await?;

                for record in records {
                    let identity = format!("{}@{}", record.name(), record.version());
                    cache.insert(identity, record.get_cid());
                    if cache.len() >= DEDUP_SAFETY_CEILING {
                        tracing::warn!(ceiling = DEDUP_SAFETY_CEILING, "dedup cache reached its safety ceiling; stopping cache build");
                        break 'modules;
                    }
                }

                if (page_len as u32) < DEDUP_BATCH_SIZE {
                    break;
                }
                offset += DEDUP_BATCH_SIZE;
            }
        }

        Ok(DedupChecker { cache: RwLock::new(cache) })
    }

    pub fn empty() -> Self {
        DedupChecker { cache: RwLock::new(HashMap::new()) }
    }

    /// Items with no stable identity (unknown source variants) are never
    /// treated as duplicates (spec.md §9).
    pub async fn is_known(&self, item: &SourceItem) -> bool {
        let identity = item.identity();
        if identity.is_empty() {
            return false;
        }
        self.cache.read().await.contains_key(&identity)
    }
}

pub type SharedDedupChecker = Arc<DedupChecker>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::McpSourceItem;

    #[tokio::test]
    async fn empty_cache_treats_everything_as_unknown() {
        let checker = DedupChecker::empty();
        let item = SourceItem::Mcp(McpSourceItem {
            id: "1".into(),
            name: "a".into(),
            version: "1.0.0".into(),
            description: String::new(),
            updated_at: String::new(),
            skills: vec![],
            raw: serde_json::json!({}),
        });
        assert!(!checker.is_known(&item).await);
    }

    #[tokio::test]
    async fn unknown_variant_is_never_a_duplicate() {
        let checker = DedupChecker::empty();
        let item = SourceItem::Unknown(serde_json::json!({"weird": true}));
        assert!(!checker.is_known(&item).await);
    }
}

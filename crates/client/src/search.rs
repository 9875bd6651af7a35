//! SearchCIDs query shape (spec.md §4.4) and the external search-index
//! collaborator. Persistence of search indexes is explicitly out of core
//! scope (spec.md §1); `SearchProvider` is the seam a real index plugs into.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub r#type: String,
    pub value: String,
}

impl SearchQuery {
    pub fn module_name(value: impl Into<String>) -> Self {
        SearchQuery { r#type: "MODULE_NAME".to_string(), value: value.into() }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// An empty query list means "all records", subject to `limit`/`offset`
    /// (spec.md §4.4).
    async fn search_cids(
        &self,
        queries: &[SearchQuery],
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<String>, ClientError>;
}

//! MCP fetcher (spec.md §4.5, stage 1). Grounded on the paginated reqwest
//! client and tolerant response scanning of `crates/openmemory_mirror`'s
//! HTTP client: build headers once, scan the response for one of a few
//! known shapes rather than assuming a single schema.

use std::collections::BTreeMap;

use reqwest::Client;
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::ImporterError;
use crate::source::{McpSourceItem, SourceItem};

pub const DEFAULT_PAGE_SIZE: u32 = 30;
pub const ALLOWED_FILTER_KEYS: &[&str] = &["search", "version", "updated_since", "limit", "cursor"];

/// Validated at construction against the closed filter-key set (spec.md
/// §4.5): unknown keys are rejected before the first request goes out.
#[derive(Debug, Clone, Default)]
pub struct FetcherFilters {
    pub search: Option<String>,
    pub version: Option<String>,
    pub updated_since: Option<String>,
    /// `0` means unlimited.
    pub limit: u64,
    pub cursor: Option<String>,
}

impl FetcherFilters {
    pub fn from_map(raw: &BTreeMap<String, String>) -> Result<Self, ImporterError> {
        for key in raw.keys() {
            if !ALLOWED_FILTER_KEYS.contains(&key.as_str()) {
                return Err(ImporterError::InvalidFilter(format!("unknown filter key: {key}")));
            }
        }
        let limit = raw
            .get("limit")
            .map(|v| v.parse::<u64>().map_err(|_| ImporterError::InvalidFilter(format!("limit is not a number: {v}"))))
            .transpose()?
            .unwrap_or(0);
        Ok(FetcherFilters {
            search: raw.get("search").cloned(),
            version: raw.get("version").cloned(),
            updated_since: raw.get("updated_since").cloned(),
            limit,
            cursor: raw.get("cursor").cloned(),
        })
    }
}

pub struct McpFetcher {
    base_url: String,
    client: Client,
}

impl McpFetcher {
    pub fn new(base_url: String, timeout_ms: u64) -> Result<Self, ImporterError> {
        let client = Client::builder().timeout(std::time::Duration::from_millis(timeout_ms)).build()?;
        Ok(McpFetcher { base_url, client })
    }

    /// Starts a background task that streams items page by page, honoring
    /// `filters.limit` (0 = unlimited) and `cancel`. The returned channels
    /// are both closed by the task on exit, success or failure (spec.md
    /// §5: "every spawned task closes its output channels on exit").
    pub fn run(&self, filters: FetcherFilters, cancel: CancellationToken) -> (mpsc::Receiver<SourceItem>, oneshot::Receiver<Option<ImporterError>>) {
        let (items_tx, items_rx) = mpsc::channel(DEFAULT_PAGE_SIZE as usize * 2);
        let (err_tx, err_rx) = oneshot::channel();

        let base_url = self.base_url.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut cursor = filters.cursor.clone();
            let mut emitted: u64 = 0;
            let mut outcome: Option<ImporterError> = None;

            loop {
                if cancel.is_cancelled() {
                    outcome = Some(ImporterError::Cancelled);
                    break;
                }

                let page = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        outcome = Some(ImporterError::Cancelled);
                        break;
                    }
                    page = fetch_page(&client, &base_url, &filters, cursor.as_deref()) => page,
                };

                let (items, next_cursor) = match page {
                    Ok(p) => p,
                    Err(e) => {
                        outcome = Some(e);
                        break;
                    }
                };

                let mut done = items.is_empty();
                for item in items {
                    if filters.limit != 0 && emitted >= filters.limit {
                        done = true;
                        break;
                    }
                    if items_tx.send(item).await.is_err() {
                        return; // receiver dropped; nothing left to report
                    }
                    emitted += 1;
                }

                if done || next_cursor.is_none() || (filters.limit != 0 && emitted >= filters.limit) {
                    break;
                }
                cursor = next_cursor;
            }

            let _ = err_tx.send(outcome);
        });

        (items_rx, err_rx)
    }
}

async fn fetch_page(
    client: &Client,
    base_url: &str,
    filters: &FetcherFilters,
    cursor: Option<&str>,
) -> Result<(Vec<SourceItem>, Option<String>), ImporterError> {
    let url = format!("{}/agents/search", base_url.trim_end_matches('/'));
    let mut query: Vec<(&str, String)> = vec![("limit", DEFAULT_PAGE_SIZE.to_string())];
    if let Some(s) = &filters.search {
        query.push(("search", s.clone()));
    }
    if let Some(v) = &filters.version {
        query.push(("version", v.clone()));
    }
    if let Some(u) = &filters.updated_since {
        query.push(("updated_since", u.clone()));
    }
    if let Some(c) = cursor {
        query.push(("cursor", c.to_string()));
    }

    let resp = client.get(&url).query(&query).send().await?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(ImporterError::InvalidResponse(format!("status={status} body={body}")));
    }

    let raw: JsonValue = resp.json().await?;
    Ok(parse_page(&raw))
}

fn parse_page(raw: &JsonValue) -> (Vec<SourceItem>, Option<String>) {
    let items_value = if let Some(arr) = raw.as_array() {
        arr.clone()
    } else if let Some(obj) = raw.as_object() {
        ["items", "results", "agents", "data"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(|v| v.as_array()).cloned())
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    let next_cursor = raw
        .as_object()
        .and_then(|obj| obj.get("next_cursor").or_else(|| obj.get("cursor")))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let items = items_value
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<McpSourceItem>(v.clone()) {
            Ok(item) => Some(SourceItem::Mcp(item)),
            Err(_) => Some(SourceItem::Unknown(v)),
        })
        .collect();

    (items, next_cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_reject_unknown_keys() {
        let mut raw = BTreeMap::new();
        raw.insert("bogus".to_string(), "1".to_string());
        let err = FetcherFilters::from_map(&raw).unwrap_err();
        assert!(matches!(err, ImporterError::InvalidFilter(_)));
    }

    #[test]
    fn filters_parse_known_keys() {
        let mut raw = BTreeMap::new();
        raw.insert("search".to_string(), "agent".to_string());
        raw.insert("limit".to_string(), "10".to_string());
        let filters = FetcherFilters::from_map(&raw).unwrap();
        assert_eq!(filters.search.as_deref(), Some("agent"));
        assert_eq!(filters.limit, 10);
    }

    #[test]
    fn parse_page_handles_wrapped_and_bare_array_shapes() {
        let wrapped = serde_json::json!({ "items": [{"id":"1","name":"a","version":"1.0.0"}], "next_cursor": "c2" });
        let (items, cursor) = parse_page(&wrapped);
        assert_eq!(items.len(), 1);
        assert_eq!(cursor.as_deref(), Some("c2"));

        let bare = serde_json::json!([{"id":"1","name":"a","version":"1.0.0"}]);
        let (items, cursor) = parse_page(&bare);
        assert_eq!(items.len(), 1);
        assert!(cursor.is_none());
    }
}

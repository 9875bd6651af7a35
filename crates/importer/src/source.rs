//! Opaque "source item" (spec.md §9): a tagged variant across known fetcher
//! outputs. The dedup checker and transformer dispatch on the variant tag;
//! unknown variants yield an empty identity and are never treated as
//! duplicates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpSourceItem {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub skills: Vec<String>,
    /// Raw upstream payload, kept for transforms that need fields this
    /// struct doesn't model yet.
    #[serde(default)]
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub enum SourceItem {
    Mcp(McpSourceItem),
    Unknown(Value),
}

impl SourceItem {
    /// `name@version`, or empty for variants with no stable identity
    /// (spec.md §9: "unknown variants yield empty name@version").
    pub fn identity(&self) -> String {
        match self {
            SourceItem::Mcp(item) => format!("{}@{}", item.name, item.version),
            SourceItem::Unknown(_) => String::new(),
        }
    }
}

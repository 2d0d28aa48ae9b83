use super::item::{Item, ItemId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A field the model answers with either a single phrase or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::One(String::new())
    }
}

fn unknown_source() -> String {
    "unknown".to_string()
}

/// Structured answer expected from the inference service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    pub literal: String,
    #[serde(default = "unknown_source")]
    pub source: String,
    #[serde(default)]
    pub mood: OneOrMany,
    #[serde(default)]
    pub action: OneOrMany,
    #[serde(default)]
    pub context: String,
    pub tags: Vec<String>,
}

/// One line of the output JSONL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionRecord {
    pub id: ItemId,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
    #[serde(default)]
    pub original_description: String,
    #[serde(flatten)]
    pub description: Description,
    pub described_at: DateTime<Utc>,
}

impl DescriptionRecord {
    pub fn new(item: &Item, description: Description) -> Self {
        Self {
            id: item.id.clone(),
            url: item.origin_url.clone(),
            attribution: item.attribution.clone(),
            original_description: item.caption.clone(),
            description,
            described_at: Utc::now(),
        }
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::table_entity;

/// pk: hackathon name, rk: repo id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateRepoEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub is_fetched: bool,
    /// Language name to bytes of code, as reported by GitHub.
    pub repo_languages: Option<BTreeMap<String, u64>>,
    pub repo_topics: Option<Vec<String>>,
}

table_entity!(TemplateRepoEntity, "TemplateRepo");

impl TemplateRepoEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn id(&self) -> &str { &self.row_key }
}

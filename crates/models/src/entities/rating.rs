use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::table_entity;

/// pk: hackathon name, rk: kind id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RatingKindEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub maximum_score: i32,
}

table_entity!(RatingKindEntity, "RatingKind");

impl RatingKindEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn id(&self) -> &str { &self.row_key }
}

/// pk: hackathon name, rk: id derived from judge, team and kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RatingEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub judge_id: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub kind_id: String,
    #[serde(default)]
    pub score: i32,
    pub description: Option<String>,
}

table_entity!(RatingEntity, "Rating");

impl RatingEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn id(&self) -> &str { &self.row_key }
}

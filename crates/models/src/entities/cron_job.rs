use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::table_entity;

/// pk and rk: job name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CronJobEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub last_execute_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paused: bool,
}

table_entity!(CronJobEntity, "CronJob");

impl CronJobEntity {
    pub fn new(name: &str) -> Self {
        Self { partition_key: name.to_string(), row_key: name.to_string(), created_at: Utc::now(), ..Default::default() }
    }
}

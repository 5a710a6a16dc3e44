use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::string_enum;
use crate::table_entity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ActivityLogCategory {
    #[default]
    Hackathon,
    User,
}

string_enum!(ActivityLogCategory { Hackathon => "hackathon", User => "user" });

/// pk: hackathon name or user id depending on `category`, rk: inversed time key plus a short id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivityLogEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub hackathon_name: Option<String>,
    pub user_id: Option<String>,
    pub correlated_user_id: Option<String>,
    #[serde(default)]
    pub category: ActivityLogCategory,
    #[serde(default)]
    pub activity_log_type: String,
    pub message: Option<String>,
}

table_entity!(ActivityLogEntity, "ActivityLog");

impl ActivityLogEntity {
    pub fn activity_id(&self) -> &str { &self.row_key }
}

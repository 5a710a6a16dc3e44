use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{string_enum, PictureInfo};
use crate::table_entity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum HackathonStatus {
    #[default]
    Planning,
    PendingApproval,
    Online,
    Offline,
}

string_enum!(HackathonStatus {
    Planning => "planning",
    PendingApproval => "pendingApproval",
    Online => "online",
    Offline => "offline",
});

/// pk: lowercased hackathon name, rk: "".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HackathonEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub display_name: String,
    pub ribbon: Option<String>,
    pub summary: Option<String>,
    pub detail: Option<String>,
    pub location: Option<String>,
    pub banners: Option<Vec<PictureInfo>>,
    #[serde(default)]
    pub status: HackathonStatus,
    #[serde(default)]
    pub max_enrollment: i32,
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub experiment_cleaned: bool,
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub creator_id: String,
    #[serde(default)]
    pub enrollment: i32,
    pub event_start_time: Option<DateTime<Utc>>,
    pub event_end_time: Option<DateTime<Utc>>,
    pub enrollment_start_time: Option<DateTime<Utc>>,
    pub enrollment_end_time: Option<DateTime<Utc>>,
    pub judge_start_time: Option<DateTime<Utc>>,
    pub judge_end_time: Option<DateTime<Utc>>,
}

table_entity!(HackathonEntity, "Hackathon");

impl HackathonEntity {
    pub fn name(&self) -> &str { &self.partition_key }

    pub fn is_online(&self) -> bool { self.status == HackathonStatus::Online }
}

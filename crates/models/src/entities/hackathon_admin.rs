use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::table_entity;

/// pk: hackathon name ("" for platform admins), rk: user id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HackathonAdminEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

table_entity!(HackathonAdminEntity, "HackathonAdmin");

impl HackathonAdminEntity {
    pub fn new(hackathon_name: &str, user_id: &str) -> Self {
        Self {
            partition_key: hackathon_name.to_string(),
            row_key: user_id.to_string(),
            created_at: Utc::now(),
            ..Default::default()
        }
    }

    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn user_id(&self) -> &str { &self.row_key }
    pub fn is_platform_admin(&self) -> bool { self.partition_key.is_empty() }
}

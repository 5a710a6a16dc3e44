use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::string_enum;
use crate::table_entity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum TeamMemberRole {
    Admin,
    #[default]
    Member,
}

string_enum!(TeamMemberRole { Admin => "admin", Member => "member" });

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum TeamMemberStatus {
    #[default]
    PendingApproval,
    Approved,
}

string_enum!(TeamMemberStatus { PendingApproval => "pendingApproval", Approved => "approved" });

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum TeamWorkType {
    #[default]
    Image,
    Website,
    Video,
    Word,
    Powerpoint,
}

string_enum!(TeamWorkType {
    Image => "image",
    Website => "website",
    Video => "video",
    Word => "word",
    Powerpoint => "powerpoint",
});

/// pk: hackathon name, rk: team id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TeamEntity {
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
    pub description: Option<String>,
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default)]
    pub creator_id: String,
    #[serde(default)]
    pub members_count: i32,
}

table_entity!(TeamEntity, "Team");

impl TeamEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn id(&self) -> &str { &self.row_key }
}

/// pk: hackathon name, rk: user id. A user joins at most one team per hackathon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TeamMemberEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub team_id: String,
    pub description: Option<String>,
    #[serde(default)]
    pub role: TeamMemberRole,
    #[serde(default)]
    pub status: TeamMemberStatus,
}

table_entity!(TeamMemberEntity, "TeamMember");

impl TeamMemberEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn user_id(&self) -> &str { &self.row_key }
}

/// pk: hackathon name, rk: work id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TeamWorkEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "Type", default)]
    pub work_type: TeamWorkType,
    #[serde(default)]
    pub url: String,
}

table_entity!(TeamWorkEntity, "TeamWork");

impl TeamWorkEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn id(&self) -> &str { &self.row_key }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{string_enum, PictureInfo};
use crate::table_entity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum AwardTarget {
    #[default]
    Team,
    Individual,
}

string_enum!(AwardTarget { Team => "team", Individual => "individual" });

/// pk: hackathon name, rk: award id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AwardEntity {
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
    pub quantity: i32,
    #[serde(default)]
    pub target: AwardTarget,
    pub pictures: Option<Vec<PictureInfo>>,
}

table_entity!(AwardEntity, "Award");

impl AwardEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn id(&self) -> &str { &self.row_key }
}

/// pk: hackathon name, rk: assignment id derived from award and assignee.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AwardAssignmentEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub award_id: String,
    /// Team id or user id, depending on the award target.
    #[serde(default)]
    pub assignee_id: String,
    pub description: Option<String>,
}

table_entity!(AwardAssignmentEntity, "AwardAssignment");

impl AwardAssignmentEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn id(&self) -> &str { &self.row_key }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{string_enum, Extension};
use crate::table_entity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum EnrollmentStatus {
    #[default]
    None,
    PendingApproval,
    Approved,
    Rejected,
}

string_enum!(EnrollmentStatus {
    None => "none",
    PendingApproval => "pendingApproval",
    Approved => "approved",
    Rejected => "rejected",
});

/// pk: hackathon name, rk: user id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnrollmentEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: EnrollmentStatus,
    pub extensions: Option<Vec<Extension>>,
}

table_entity!(EnrollmentEntity, "Enrollment");

impl EnrollmentEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn user_id(&self) -> &str { &self.row_key }
}

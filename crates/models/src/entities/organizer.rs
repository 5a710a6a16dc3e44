use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{string_enum, Extension, PictureInfo};
use crate::table_entity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum OrganizerType {
    #[default]
    Host,
    Organizer,
    Coorganizer,
    Sponsor,
    TitleSponsor,
}

string_enum!(OrganizerType {
    Host => "host",
    Organizer => "organizer",
    Coorganizer => "coorganizer",
    Sponsor => "sponsor",
    TitleSponsor => "titleSponsor",
});

/// pk: hackathon name, rk: organizer id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrganizerEntity {
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
    #[serde(rename = "Type", default)]
    pub organizer_type: OrganizerType,
    pub logo: Option<PictureInfo>,
}

table_entity!(OrganizerEntity, "Organizer");

impl OrganizerEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn id(&self) -> &str { &self.row_key }
}

/// pk: hackathon name, rk: announcement id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnnouncementEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

table_entity!(AnnouncementEntity, "Announcement");

impl AnnouncementEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn id(&self) -> &str { &self.row_key }
}

/// pk: hackathon name, rk: "".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QuestionnaireEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub extensions: Vec<Extension>,
}

table_entity!(QuestionnaireEntity, "Questionnaire");

impl QuestionnaireEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
}

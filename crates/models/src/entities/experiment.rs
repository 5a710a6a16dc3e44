use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::string_enum;
use crate::table_entity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum IngressProtocol {
    #[default]
    Vnc,
}

string_enum!(IngressProtocol { Vnc => "vnc" });

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VncSettings {
    pub user_name: String,
    pub password: String,
}

/// pk: hackathon name, rk: template id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateEntity {
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
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
    #[serde(default)]
    pub ingress_protocol: IngressProtocol,
    #[serde(default)]
    pub ingress_port: i32,
    pub vnc: Option<VncSettings>,
}

table_entity!(TemplateEntity, "Template");

impl TemplateEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn id(&self) -> &str { &self.row_key }
}

/// pk: hackathon name, rk: id derived from user and template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExperimentEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub template_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub paused: bool,
}

table_entity!(ExperimentEntity, "Experiment");

impl ExperimentEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn id(&self) -> &str { &self.row_key }
}

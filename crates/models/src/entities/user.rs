use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::table_entity;

/// External identity linked to a user account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub provider: String,
    pub open_id: Option<String>,
    pub user_id_in_idp: Option<String>,
    #[serde(default)]
    pub is_social: bool,
}

/// pk: lowercased user id, rk: "".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub middle_name: Option<String>,
    pub profile: Option<String>,
    pub preferred_username: Option<String>,
    pub website: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<String>,
    pub zoneinfo: Option<String>,
    pub company: Option<String>,
    pub locale: Option<String>,
    pub formatted: Option<String>,
    pub street_address: Option<String>,
    pub locality: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
    pub address: Option<String>,
    pub browser: Option<String>,
    pub device: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    pub arn: Option<String>,
    pub user_pool_id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub phone: Option<String>,
    #[serde(default)]
    pub phone_verified: bool,
    pub unionid: Option<String>,
    pub open_id: Option<String>,
    pub identities: Option<Vec<Identity>>,
    pub nickname: Option<String>,
    pub register_source: Option<Vec<String>>,
    pub photo: Option<String>,
    pub token: Option<String>,
    pub token_expired_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub logins_count: i32,
    pub last_login: Option<String>,
    pub last_ip: Option<String>,
    pub signed_up: Option<String>,
    #[serde(default)]
    pub blocked: bool,
}

table_entity!(UserEntity, "User");

impl UserEntity {
    pub fn user_id(&self) -> &str { &self.partition_key }

    /// Nickname, then name, then username, then the id.
    pub fn display_name(&self) -> String {
        [&self.nickname, &self.name, &self.username]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| self.partition_key.clone())
    }
}

/// pk: sha512 hex of the token, rk: "".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserTokenEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub user_id: String,
    pub user_display_name: Option<String>,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub token_expired_at: DateTime<Utc>,
}

table_entity!(UserTokenEntity, "UserToken");

/// pk: rank as a string, rk: "".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TopUserEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub score: i32,
}

table_entity!(TopUserEntity, "TopUser");

impl TopUserEntity {
    pub fn rank(&self) -> i32 { self.partition_key.parse().unwrap_or_default() }
}

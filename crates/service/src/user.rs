//! Users, login tokens and the top-user ranking.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use common::digest::sha512_hex;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use models::entities::{Identity, TopUserEntity, UserEntity, UserTokenEntity};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::cache::{cache_key, CacheEntryType};
use crate::context::ManagementContext;
use crate::errors::{ServiceError, ServiceResult};
use crate::hackathon_admin::HackathonAdminManagement;

const USER_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const TOKEN_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
const SEARCH_BATCH: usize = 100;
pub const DEFAULT_TOP_USERS: usize = 10;

/// Login payload from the identity provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub token: Option<String>,
    pub token_expired_at: Option<DateTime<Utc>>,
    pub user_pool_id: Option<String>,
    pub username: Option<String>,
    pub nickname: Option<String>,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub middle_name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub phone: Option<String>,
    #[serde(default)]
    pub phone_verified: bool,
    pub photo: Option<String>,
    pub company: Option<String>,
    pub gender: Option<String>,
    pub locale: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub website: Option<String>,
    pub identities: Option<Vec<Identity>>,
    pub last_ip: Option<String>,
    pub last_login: Option<String>,
    #[serde(default)]
    pub logins_count: i32,
}

impl UserInfo {
    fn into_entity(self, user_id: String) -> UserEntity {
        UserEntity {
            partition_key: user_id,
            row_key: String::new(),
            created_at: Utc::now(),
            user_pool_id: self.user_pool_id,
            username: self.username,
            nickname: self.nickname,
            name: self.name,
            given_name: self.given_name,
            family_name: self.family_name,
            middle_name: self.middle_name,
            email: self.email,
            email_verified: self.email_verified,
            phone: self.phone,
            phone_verified: self.phone_verified,
            photo: self.photo,
            company: self.company,
            gender: self.gender,
            locale: self.locale,
            country: self.country,
            city: self.city,
            website: self.website,
            identities: self.identities,
            last_ip: self.last_ip,
            last_login: self.last_login,
            logins_count: self.logins_count,
            token: self.token,
            token_expired_at: self.token_expired_at,
            ..Default::default()
        }
    }
}

/// Outcome of a token check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    Valid,
    Missing,
    Expired(DateTime<Utc>),
}

/// Identity attached to authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserClaims {
    pub user_id: String,
    pub user_display_name: String,
    pub is_platform_admin: bool,
}

#[derive(Deserialize)]
struct LoginClaims {
    sub: String,
    exp: i64,
}

/// Checks identity-provider tokens before a login is accepted.
///
/// Tokens are HS256 JWTs whose `sub` must name the user logging in. Without a
/// key every token is refused.
#[derive(Clone, Default)]
pub struct TokenVerifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl TokenVerifier {
    pub fn hs256(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        Self { key: Some(DecodingKey::from_secret(secret.as_bytes())), validation }
    }

    pub fn from_config(cfg: &configs::AuthConfig) -> Self {
        match cfg.jwt_secret.as_deref() {
            Some(secret) => Self::hs256(secret, cfg.issuer.as_deref()),
            None => Self::default(),
        }
    }

    pub fn is_enabled(&self) -> bool { self.key.is_some() }

    /// Expiry of `token` once it is proven to belong to `user_id`.
    pub fn verify(&self, token: &str, user_id: &str) -> ServiceResult<DateTime<Utc>> {
        let Some(key) = &self.key else {
            return Err(ServiceError::Validation("login is disabled: no token verification key is configured".into()));
        };
        let data = decode::<LoginClaims>(token, key, &self.validation)
            .map_err(|e| ServiceError::Validation(format!("invalid token: {e}")))?;
        if !data.claims.sub.eq_ignore_ascii_case(user_id) {
            return Err(ServiceError::Validation(format!("token was not issued to {user_id}")));
        }
        Utc.timestamp_opt(data.claims.exp, 0)
            .single()
            .ok_or_else(|| ServiceError::Validation("invalid token expiry".into()))
    }
}

#[derive(Clone)]
pub struct UserManagement {
    ctx: ManagementContext,
    admins: HackathonAdminManagement,
    verifier: Arc<TokenVerifier>,
}

impl UserManagement {
    /// Token logins stay refused until [`with_verifier`](Self::with_verifier) supplies a key.
    pub fn new(ctx: ManagementContext) -> Self {
        Self { admins: HackathonAdminManagement::new(ctx.clone()), ctx, verifier: Arc::new(TokenVerifier::default()) }
    }

    pub fn with_verifier(mut self, verifier: TokenVerifier) -> Self {
        self.verifier = Arc::new(verifier);
        self
    }

    /// Save a logged-in user and remember its token.
    ///
    /// A token must pass the [`TokenVerifier`]; its `exp` becomes the token expiry.
    #[instrument(skip(self, user_info), fields(user_id = %user_info.id))]
    pub async fn authing(&self, mut user_info: UserInfo) -> ServiceResult<UserEntity> {
        let user_id = user_info.id.trim().to_lowercase();
        if user_id.is_empty() {
            return Err(ServiceError::Validation("user id is required".into()));
        }
        let token = user_info.token.clone().filter(|t| !t.trim().is_empty());
        if let Some(token) = &token {
            user_info.token_expired_at = Some(self.verifier.verify(token, &user_id)?);
        }
        let mut entity = user_info.into_entity(user_id.clone());
        if let Some(existing) = self.ctx.storage.users.retrieve(&user_id, "").await? {
            entity.created_at = existing.created_at;
        }
        let saved = self.ctx.storage.users.insert_or_merge(&entity).await?;
        self.ctx.cache.remove(&cache_key(CacheEntryType::User, &user_id)).await;

        if let Some(token) = token {
            let hash = sha512_hex(&token);
            let token_entity = UserTokenEntity {
                partition_key: hash.clone(),
                row_key: String::new(),
                created_at: Utc::now(),
                user_id: user_id.clone(),
                user_display_name: Some(saved.display_name()),
                token,
                token_expired_at: saved.token_expired_at.unwrap_or_else(Utc::now),
                ..Default::default()
            };
            self.ctx.storage.user_tokens.insert_or_replace(&token_entity).await?;
            self.ctx.cache.remove(&cache_key(CacheEntryType::Token, &hash)).await;
        }
        info!("user_logged_in");
        Ok(saved)
    }

    /// Cached for an hour.
    pub async fn get_user_by_id(&self, user_id: &str) -> ServiceResult<Option<UserEntity>> {
        if user_id.trim().is_empty() {
            return Ok(None);
        }
        let id = user_id.to_lowercase();
        let storage = self.ctx.storage.clone();
        self.ctx
            .cache
            .get_or_add_opt(&cache_key(CacheEntryType::User, &id), USER_CACHE_TTL, || async move {
                storage.users.retrieve(&id, "").await.map_err(ServiceError::from)
            })
            .await
    }

    /// Case-insensitive match over ids, contact details and names.
    pub async fn search_user(&self, search: &str, top: usize) -> ServiceResult<Vec<UserEntity>> {
        let needle = search.trim().to_lowercase();
        let top = top.max(1);
        let mut results = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.ctx.storage.users.query_segmented(None, token.as_deref(), Some(SEARCH_BATCH)).await?;
            results.extend(page.values.into_iter().filter(|u| user_matches(u, &needle)));
            token = page.continuation_token;
            if results.len() >= top || token.is_none() {
                break;
            }
        }
        results.truncate(top);
        Ok(results)
    }

    pub async fn list_top_users(&self, top: Option<usize>) -> ServiceResult<Vec<TopUserEntity>> {
        let mut all = self.ctx.storage.top_users.query_entities(None).await?;
        all.sort_by_key(|t| t.rank());
        all.truncate(top.unwrap_or(DEFAULT_TOP_USERS));
        Ok(all)
    }

    /// Replace the ranking with `scores`, best first. Ranks start at 0.
    pub async fn replace_top_users(&self, scores: &[(String, i32)]) -> ServiceResult<()> {
        let stale = self.ctx.storage.top_users.query_entities(None).await?;
        for (rank, (user_id, score)) in scores.iter().enumerate() {
            let entity = TopUserEntity {
                partition_key: rank.to_string(),
                row_key: String::new(),
                created_at: Utc::now(),
                user_id: user_id.clone(),
                score: *score,
                ..Default::default()
            };
            self.ctx.storage.top_users.insert_or_replace(&entity).await?;
        }
        for old in stale.into_iter().filter(|t| t.rank() as usize >= scores.len()) {
            self.ctx.storage.top_users.delete(&old.partition_key, "").await?;
        }
        info!(count = scores.len(), "top_users_replaced");
        Ok(())
    }

    /// Cached for five minutes; unknown tokens are not cached.
    pub async fn get_token_entity(&self, token: &str) -> ServiceResult<Option<UserTokenEntity>> {
        if token.trim().is_empty() {
            return Ok(None);
        }
        let hash = sha512_hex(token);
        let key = cache_key(CacheEntryType::Token, &hash);
        let storage = self.ctx.storage.clone();
        self.ctx
            .cache
            .get_or_add_opt(&key, TOKEN_CACHE_TTL, || async move {
                storage.user_tokens.retrieve(&hash, "").await.map_err(ServiceError::from)
            })
            .await
    }

    pub fn validate_token_entity(entity: Option<&UserTokenEntity>) -> TokenStatus {
        match entity {
            None => TokenStatus::Missing,
            Some(t) if t.token_expired_at < Utc::now() => TokenStatus::Expired(t.token_expired_at),
            Some(_) => TokenStatus::Valid,
        }
    }

    /// Existence and expiry of a token.
    pub async fn validate_token(&self, token: &str) -> ServiceResult<TokenStatus> {
        Ok(Self::validate_token_entity(self.get_token_entity(token).await?.as_ref()))
    }

    /// Claims of a valid token; `None` for missing or expired tokens.
    pub async fn get_user_basic_claims(&self, token: &str) -> ServiceResult<Option<UserClaims>> {
        let Some(entity) = self.get_token_entity(token).await? else {
            return Ok(None);
        };
        if Self::validate_token_entity(Some(&entity)) != TokenStatus::Valid {
            return Ok(None);
        }
        let is_platform_admin = self.admins.is_platform_admin(&entity.user_id).await?;
        debug!(user_id = %entity.user_id, is_platform_admin, "claims_resolved");
        Ok(Some(UserClaims {
            user_display_name: entity.user_display_name.clone().unwrap_or_else(|| entity.user_id.clone()),
            user_id: entity.user_id,
            is_platform_admin,
        }))
    }
}

fn user_matches(user: &UserEntity, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let fields = [
        Some(&user.partition_key),
        user.email.as_ref(),
        user.phone.as_ref(),
        user.username.as_ref(),
        user.name.as_ref(),
        user.given_name.as_ref(),
        user.family_name.as_ref(),
        user.middle_name.as_ref(),
        user.nickname.as_ref(),
    ];
    fields.into_iter().flatten().any(|f| f.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        exp: i64,
    }

    fn jwt(sub: &str, secret: &str) -> String {
        let exp = (Utc::now() + chrono::Duration::hours(1)).timestamp();
        encode(&Header::default(), &Claims { sub, exp }, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn users(ctx: ManagementContext) -> UserManagement {
        UserManagement::new(ctx).with_verifier(TokenVerifier::hs256(SECRET, None))
    }

    fn login(id: &str, token: &str) -> UserInfo {
        UserInfo {
            id: id.into(),
            token: Some(token.into()),
            nickname: Some("Nick".into()),
            email: Some("nick@example.com".into()),
            ..Default::default()
        }
    }

    #[test]
    fn verifier_binds_token_to_user() -> anyhow::Result<()> {
        let verifier = TokenVerifier::hs256(SECRET, None);
        let expiry = verifier.verify(&jwt("Alice", SECRET), "alice")?;
        assert!(expiry > Utc::now());
        assert!(verifier.verify(&jwt("mallory", SECRET), "alice").is_err());
        assert!(verifier.verify(&jwt("alice", "other-secret"), "alice").is_err());
        assert!(verifier.verify("not-a-jwt", "alice").is_err());
        assert!(TokenVerifier::default().verify(&jwt("alice", SECRET), "alice").is_err());
        Ok(())
    }

    #[test]
    fn verifier_checks_issuer() {
        let verifier = TokenVerifier::hs256(SECRET, Some("https://idp.example.com"));
        assert!(matches!(verifier.verify(&jwt("alice", SECRET), "alice"), Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn authing_stores_user_and_token() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        let mgmt = users(ctx.clone());
        let token = jwt("alice", SECRET);
        let user = mgmt.authing(login("Alice", &token)).await?;
        assert_eq!(user.user_id(), "alice");
        assert_eq!(mgmt.get_user_by_id("ALICE").await?.map(|u| u.display_name()), Some("Nick".to_string()));

        assert_eq!(mgmt.validate_token(&token).await?, TokenStatus::Valid);
        assert_eq!(mgmt.validate_token("other").await?, TokenStatus::Missing);
        let claims = mgmt.get_user_basic_claims(&token).await?.unwrap();
        assert_eq!(claims.user_id, "alice");
        assert_eq!(claims.user_display_name, "Nick");
        assert!(!claims.is_platform_admin);

        HackathonAdminManagement::new(ctx).create_platform_admin("alice").await?;
        assert!(mgmt.get_user_basic_claims(&token).await?.unwrap().is_platform_admin);
        Ok(())
    }

    #[tokio::test]
    async fn forged_tokens_cannot_log_in() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        HackathonAdminManagement::new(ctx.clone()).create_platform_admin("root").await?;
        let mgmt = users(ctx);

        let made_up = mgmt.authing(login("root", "made-up-token")).await;
        assert!(matches!(made_up, Err(ServiceError::Validation(_))));
        let wrong_subject = jwt("mallory", SECRET);
        assert!(mgmt.authing(login("root", &wrong_subject)).await.is_err());

        assert!(mgmt.get_user_basic_claims("made-up-token").await?.is_none());
        assert!(mgmt.get_user_basic_claims(&wrong_subject).await?.is_none());
        assert!(mgmt.get_user_by_id("root").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn relogin_keeps_created_at() -> anyhow::Result<()> {
        let mgmt = users(ManagementContext::in_memory());
        let first = mgmt.authing(login("alice", &jwt("alice", SECRET))).await?;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = mgmt.authing(login("alice", &jwt("alice", SECRET))).await?;
        assert_eq!(second.created_at, first.created_at);
        Ok(())
    }

    #[tokio::test]
    async fn token_lookups_are_cached() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        let mgmt = users(ctx.clone());
        let token = jwt("alice", SECRET);
        mgmt.authing(login("alice", &token)).await?;
        assert!(mgmt.get_user_basic_claims(&token).await?.is_some());

        // still served after the row is gone from storage
        ctx.storage.user_tokens.delete(&sha512_hex(&token), "").await?;
        assert!(mgmt.get_user_basic_claims(&token).await?.is_some());
        ctx.cache.remove(&cache_key(CacheEntryType::Token, &sha512_hex(&token))).await;
        assert!(mgmt.get_user_basic_claims(&token).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        let mgmt = users(ctx.clone());
        let expired = UserTokenEntity {
            partition_key: sha512_hex("old"),
            row_key: String::new(),
            user_id: "bob".into(),
            token: "old".into(),
            token_expired_at: Utc::now() - chrono::Duration::minutes(1),
            ..Default::default()
        };
        ctx.storage.user_tokens.insert_or_replace(&expired).await?;
        assert!(matches!(mgmt.validate_token("old").await?, TokenStatus::Expired(_)));
        assert!(mgmt.get_user_basic_claims("old").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn search_and_rank_users() -> anyhow::Result<()> {
        let mgmt = users(ManagementContext::in_memory());
        mgmt.authing(login("alice", &jwt("alice", SECRET))).await?;
        mgmt.authing(UserInfo { id: "bob".into(), email: Some("BOB@corp.com".into()), ..Default::default() }).await?;
        assert_eq!(mgmt.search_user("corp", 10).await?.len(), 1);
        assert_eq!(mgmt.search_user("NICK", 10).await?.len(), 1);
        assert_eq!(mgmt.search_user("", 1).await?.len(), 1);

        mgmt.replace_top_users(&[("bob".into(), 9), ("alice".into(), 3)]).await?;
        let top = mgmt.list_top_users(None).await?;
        assert_eq!(top.iter().map(|t| t.user_id.as_str()).collect::<Vec<_>>(), vec!["bob", "alice"]);
        mgmt.replace_top_users(&[("alice".into(), 5)]).await?;
        assert_eq!(mgmt.list_top_users(Some(5)).await?.len(), 1);
        Ok(())
    }
}

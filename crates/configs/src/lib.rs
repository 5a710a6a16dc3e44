use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub kubernetes: KubernetesConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub cron: CronConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8081, worker_threads: Some(4) }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")] 
    pub max_connections: u32,
    #[serde(default = "default_min_connections")] 
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")] 
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")] 
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")] 
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout")] 
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_max_lifetime() -> u64 { 3600 }
fn default_acquire_timeout() -> u64 { 30 }

/// Table storage backend.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self { Self { enabled: true } }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KubernetesConfig {
    /// e.g. `https://127.0.0.1:6443`; empty disables the cluster client.
    #[serde(default)]
    pub api_server: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self { api_server: String::new(), token: None, namespace: default_namespace(), accept_invalid_certs: false }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_github_api")]
    pub api_base: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self { Self { api_base: default_github_api(), token: None } }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CronConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_report_dir")]
    pub report_dir: String,
}

impl Default for CronConfig {
    fn default() -> Self { Self { enabled: true, report_dir: default_report_dir() } }
}

/// Verification of identity-provider tokens presented at login.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// HS256 signing secret; logins are refused while unset.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// Required `iss` claim when set.
    #[serde(default)]
    pub issuer: Option<String>,
}

impl AuthConfig {
    fn normalize_from_env(&mut self) {
        if self.jwt_secret.as_deref().map_or(true, |s| s.trim().is_empty()) {
            self.jwt_secret = std::env::var("AUTH_JWT_SECRET").ok().filter(|s| !s.trim().is_empty());
        }
        if self.issuer.as_deref().is_some_and(|i| i.trim().is_empty()) {
            self.issuer = None;
        }
    }

    pub fn is_configured(&self) -> bool { self.jwt_secret.is_some() }
}

fn default_true() -> bool { true }
fn default_namespace() -> String { "default".into() }
fn default_github_api() -> String { "https://api.github.com".into() }
fn default_report_dir() -> String { "data/reports".into() }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        // database settings only matter for the postgres backend
        if self.storage.backend == StorageBackend::Postgres {
            self.database.normalize_from_env();
            self.database.validate()?;
        }
        self.kubernetes.normalize();
        self.auth.normalize_from_env();
        if self.cron.report_dir.trim().is_empty() {
            return Err(anyhow!("cron.report_dir must not be empty"));
        }
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(4); }
        } else {
            self.worker_threads = Some(4);
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn normalize_from_env(&mut self) {
        if self.url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("database.url is empty; set it in config.toml or DATABASE_URL"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://")) {
            return Err(anyhow!("database.url must start with postgresql:// or postgres://"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive seconds"));
        }
        Ok(())
    }
}

impl KubernetesConfig {
    fn normalize(&mut self) {
        self.api_server = self.api_server.trim().trim_end_matches('/').to_string();
        if self.namespace.trim().is_empty() {
            self.namespace = default_namespace();
        }
        if self.token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            self.token = None;
        }
    }

    pub fn is_configured(&self) -> bool { !self.api_server.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_file() -> Result<()> {
        let mut cfg: AppConfig = toml::from_str("")?;
        cfg.normalize_and_validate()?;
        assert_eq!(cfg.server.port, 8081);
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert!(cfg.cache.enabled);
        assert_eq!(cfg.kubernetes.namespace, "default");
        assert!(!cfg.kubernetes.is_configured());
        assert_eq!(cfg.github.api_base, "https://api.github.com");
        Ok(())
    }

    #[test]
    fn sections_parse() -> Result<()> {
        let mut cfg: AppConfig = toml::from_str(
            r#"
            [server]
            host = ""
            port = 9000
            worker_threads = 0

            [storage]
            backend = "postgres"

            [database]
            url = "postgres://u:p@localhost/db"

            [cache]
            enabled = false

            [kubernetes]
            api_server = "https://k8s.local:6443/"
            token = " "

            [auth]
            jwt_secret = "s3cret"
            issuer = ""
            "#,
        )?;
        cfg.normalize_and_validate()?;
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.worker_threads, Some(4));
        assert!(!cfg.cache.enabled);
        assert_eq!(cfg.kubernetes.api_server, "https://k8s.local:6443");
        assert!(cfg.kubernetes.token.is_none());
        assert_eq!(cfg.auth.jwt_secret.as_deref(), Some("s3cret"));
        assert!(cfg.auth.issuer.is_none());
        Ok(())
    }

    #[test]
    fn postgres_backend_requires_url() {
        let mut cfg = AppConfig { storage: StorageConfig { backend: StorageBackend::Postgres }, ..Default::default() };
        cfg.database.url = "mysql://x".into();
        assert!(cfg.normalize_and_validate().is_err());
    }
}

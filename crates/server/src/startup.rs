use std::{env, future::Future, net::SocketAddr, sync::Arc};

use axum::Router;
use common::utils::logging::init_logging_default;
use configs::{AppConfig, StorageBackend};
use dotenvy::dotenv;
use migration::MigratorTrait;
use models::{MemoryTableStore, SeaOrmTableStore, TableStore};
use service::{
    app::Managements,
    cache::CacheProvider,
    context::ManagementContext,
    github::{GitHubClient, RestGitHubClient},
    kubernetes::{mock::MockKubernetesCluster, KubernetesCluster, KubeCluster, DEFAULT_NAMESPACE},
    user::TokenVerifier,
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{errors::StartupError, openapi::ApiDoc, routes, state::AppState};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Load `config.toml`, falling back to defaults plus env vars when it is missing.
fn load_config() -> Result<AppConfig, StartupError> {
    match AppConfig::load_and_validate() {
        Ok(cfg) => Ok(cfg),
        Err(e) => {
            warn!(error = %e, "config.toml unavailable; using defaults");
            let mut cfg = AppConfig::default();
            if let Ok(host) = env::var("SERVER_HOST") {
                cfg.server.host = host;
            }
            if let Some(port) = env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
                cfg.server.port = port;
            }
            if env::var("STORAGE_BACKEND").is_ok_and(|b| b.eq_ignore_ascii_case("postgres")) {
                cfg.storage.backend = StorageBackend::Postgres;
            }
            cfg.normalize_and_validate().map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
            Ok(cfg)
        }
    }
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bind address: {e}")))
}

async fn build_store(cfg: &AppConfig) -> Result<Arc<dyn TableStore>, StartupError> {
    match cfg.storage.backend {
        StorageBackend::Memory => {
            info!("using in-memory table storage");
            Ok(Arc::new(MemoryTableStore::new()))
        }
        StorageBackend::Postgres => {
            let db = models::db::connect_with_config(&models::db::DatabaseConfig::from(&cfg.database))
                .await
                .map_err(|e| StartupError::Backend(e.to_string()))?;
            migration::Migrator::up(&db, None).await.map_err(|e| StartupError::Backend(e.to_string()))?;
            info!("postgres table storage ready");
            Ok(Arc::new(SeaOrmTableStore::new(db)))
        }
    }
}

/// Wire every management from configuration.
pub async fn build_managements(cfg: &AppConfig) -> Result<Managements, StartupError> {
    let store = build_store(cfg).await?;
    let ctx = ManagementContext::new(store, Arc::new(CacheProvider::from_config(&cfg.cache)));

    let (cluster, namespace): (Arc<dyn KubernetesCluster>, String) = if cfg.kubernetes.is_configured() {
        let cluster =
            KubeCluster::new(&cfg.kubernetes).map_err(|e| StartupError::Backend(e.to_string()))?;
        let namespace = cluster.namespace().to_string();
        (Arc::new(cluster), namespace)
    } else {
        warn!("kubernetes api_server not set; experiments run against the in-process cluster");
        (Arc::new(MockKubernetesCluster::default()), DEFAULT_NAMESPACE.to_string())
    };
    let github: Arc<dyn GitHubClient> =
        Arc::new(RestGitHubClient::new(&cfg.github).map_err(|e| StartupError::Backend(e.to_string()))?);

    if !cfg.auth.is_configured() {
        warn!("auth.jwt_secret not set; token logins will be refused");
    }
    let verifier = TokenVerifier::from_config(&cfg.auth);

    Ok(Managements::new(ctx, github, cluster, namespace).with_token_verifier(verifier))
}

/// API router plus the Swagger UI.
pub fn app(state: AppState) -> Router {
    routes::build_router(state, build_cors())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

/// Public entry: serve until Ctrl+C.
pub async fn run() -> anyhow::Result<()> {
    run_until(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl_c listener failed");
        }
    })
    .await
}

/// Build the app and serve until `shutdown` resolves; cron jobs stop with it.
pub async fn run_until(shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
    dotenv().ok();
    init_logging_default();

    let cfg = load_config()?;
    let managements = build_managements(&cfg).await?;

    common::env::ensure_env(&cfg.cron.report_dir).await?;
    let cron_handles = if cfg.cron.enabled {
        let handles = Arc::new(managements.cron_scheduler(&cfg.cron.report_dir)).start();
        info!(jobs = handles.len(), "cron scheduler started");
        handles
    } else {
        Vec::new()
    };

    let app = app(AppState::new(managements));

    let addr = bind_addr(&cfg)?;
    info!(%addr, "starting open hackathon server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    for handle in cron_handles {
        handle.abort();
    }
    info!("server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_uses_server_section() -> anyhow::Result<()> {
        let mut cfg = AppConfig::default();
        cfg.server.port = 9090;
        assert_eq!(bind_addr(&cfg)?.to_string(), "127.0.0.1:9090");
        Ok(())
    }

    #[test]
    fn bind_addr_rejects_bad_host() {
        let mut cfg = AppConfig::default();
        cfg.server.host = "not a host".into();
        assert!(matches!(bind_addr(&cfg), Err(StartupError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn memory_backend_builds_managements() -> anyhow::Result<()> {
        let m = build_managements(&AppConfig::default()).await?;
        assert!(m.hackathons.get_hackathon_entity_by_name("missing").await?.is_none());
        Ok(())
    }
}

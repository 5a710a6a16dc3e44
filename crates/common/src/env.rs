//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use tracing::warn;

/// Ensure the report directory exists; warn when it had to be created.
pub async fn ensure_env(report_dir: &str) -> anyhow::Result<()> {
    if tokio::fs::metadata(report_dir).await.is_err() {
        warn!(%report_dir, "report directory not found; creating it");
    }
    tokio::fs::create_dir_all(report_dir)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {report_dir}: {e}"))?;
    Ok(())
}

/// Read an env var, treating blank values as unset.
pub fn var_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_missing_dir() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join(format!("oh-env-{}", uuid::Uuid::new_v4().simple()));
        let path = dir.to_string_lossy().to_string();
        ensure_env(&path).await?;
        assert!(tokio::fs::metadata(&path).await?.is_dir());
        tokio::fs::remove_dir_all(&path).await?;
        Ok(())
    }
}

use std::io;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,tower_http=info,axum=info,service::cron=debug";

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// `LOG_FORMAT=json` selects structured output; anything else is compact.
    pub fn from_env() -> Self {
        match crate::env::var_non_empty("LOG_FORMAT") {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Compact,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize the subscriber in the format chosen by `LOG_FORMAT`.
/// - Respects `RUST_LOG`, e.g. `RUST_LOG=info,service::cron=trace`
/// - Writes to stdout
pub fn init_logging_default() {
    match LogFormat::from_env() {
        LogFormat::Compact => init_logging_compact(),
        LogFormat::Json => init_logging_json(),
    }
}

pub fn init_logging_compact() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .compact()
        .with_writer(io::stdout)
        .try_init();
}

/// One JSON object per event, for container log collectors.
pub fn init_logging_json() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .json()
        .with_writer(io::stdout)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_defaults_to_compact() {
        assert_eq!(LogFormat::default(), LogFormat::Compact);
    }
}

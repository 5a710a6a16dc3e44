use std::process::ExitCode;

use tracing::{error, info};
use uuid::Uuid;

/// Worker threads from `config.toml`, then `TOKIO_WORKER_THREADS`.
fn worker_threads() -> Option<usize> {
    match configs::AppConfig::load_and_validate() {
        Ok(cfg) => cfg.server.worker_threads,
        Err(_) => common::env::var_non_empty("TOKIO_WORKER_THREADS").and_then(|v| v.parse::<usize>().ok()),
    }
}

fn main() -> ExitCode {
    // .env first so RUST_LOG and LOG_FORMAT apply
    dotenvy::dotenv().ok();
    common::utils::logging::init_logging_default();

    let instance_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    std::panic::set_hook(Box::new(move |info| {
        error!(event = "panic", %instance_id, pid, message = %info, "unhandled panic");
    }));

    let threads = worker_threads();
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(w) = threads {
        builder.worker_threads(w);
    }
    let rt = match builder.build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    info!(event = "start", %instance_id, pid, version, threads = threads.unwrap_or_default(), "open hackathon server starting");

    match rt.block_on(server::run()) {
        Ok(()) => {
            info!(event = "stop", %instance_id, pid, "server stopped normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(event = "run_failed", %instance_id, error = %e, "server exited with error");
            ExitCode::FAILURE
        }
    }
}

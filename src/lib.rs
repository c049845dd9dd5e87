// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod event;
pub mod exec;
pub mod files;
pub mod fs;
pub mod http;
pub mod logging;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::validate::parse_bind;
use crate::config::{ConfigFile, default_config_path, load_and_validate};
use crate::engine::{SessionCore, spawn_session};
use crate::exec::TokioLauncher;
use crate::files::ScanStore;
use crate::fs::RealFileSystem;
use crate::http::AppState;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (+ CLI overrides)
/// - the test session with the real process launcher
/// - the scan file store
/// - the HTTP API
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = resolve_config(&args)?;
    info!(
        bind = %cfg.bind,
        python = %cfg.runner.python,
        script_dir = ?cfg.runner.effective_script_dir(),
        grace_ms = cfg.supervisor.grace_period.as_millis() as u64,
        "configuration loaded"
    );

    let store = ScanStore::open(Arc::new(RealFileSystem), cfg.scan_dir.clone())?;
    info!(dir = ?store.dir(), "serving scan files");

    let core = SessionCore::from_config(&cfg);
    let (session, session_task) = spawn_session(core, TokioLauncher);

    let app = http::router(AppState {
        session: session.clone(),
        store: Arc::new(store),
    });

    let listener = tokio::net::TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("binding {}", cfg.bind))?;
    info!(addr = %cfg.bind, "serving HTTP API");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            info!("Ctrl+C received; shutting down");
        })
        .await
        .context("serving HTTP API")?;

    // Make sure no test or cleanup process outlives us.
    if session.shutdown().await.is_ok() {
        let _ = session_task.await;
    }

    Ok(())
}

/// Load the config file (explicit path, or `scantest.toml` if present) and
/// apply CLI overrides.
fn resolve_config(args: &CliArgs) -> Result<ConfigFile> {
    let mut cfg = match &args.config {
        Some(path) => load_and_validate(path)
            .with_context(|| format!("loading config from {path}"))?,
        None => {
            let path = default_config_path();
            if path.exists() {
                load_and_validate(&path)
                    .with_context(|| format!("loading config from {:?}", path))?
            } else {
                ConfigFile::default()
            }
        }
    };

    if let Some(bind) = &args.bind {
        cfg.bind = parse_bind(bind)?;
    }
    if args.dummy {
        cfg.runner.use_dummy = true;
    }

    Ok(cfg)
}

//! `nextai-gateway run` — start the HTTP server (spec §5, §6).

use anyhow::Context;
use sa_domain::config::{Config, ConfigSeverity};

use crate::state::AppState;

pub async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("nextai-gateway starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!("config validation failed with {} error(s)", issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count());
    }

    let shutdown_timeout = config.server.shutdown_timeout_seconds;
    let host = config.server.host.clone();
    let port = config.server.port;

    let state = AppState::bootstrap(config).await.context("bootstrapping application state")?;
    if state.providers.is_empty() {
        tracing::warn!("no LLM providers initialized — the demo adapter will be used for every turn");
    } else {
        tracing::info!(providers = state.providers.len(), "provider registry ready");
    }

    if !state.config.server.disable_qq_inbound_supervisor {
        tracing::info!("qq inbound supervisor enabled");
    }

    {
        let state = state.clone();
        tokio::spawn(async move {
            crate::runtime::schedule_runner::run(state).await;
        });
    }
    tracing::info!("cron scheduler started");

    let app = crate::api::router(state.clone()).with_state(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "nextai-gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
        .await
        .context("axum server error")?;

    Ok(())
}

/// Waits for Ctrl+C, then lets axum drain in-flight requests. A watchdog
/// force-exits after `timeout_seconds` in case a turn never finishes
/// (spec §5: "then force-closes").
async fn shutdown_signal(timeout_seconds: u64) {
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("shutdown signal received, draining in-flight turns");

    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(timeout_seconds)).await;
        tracing::warn!("graceful shutdown deadline exceeded, forcing exit");
        std::process::exit(0);
    });
}

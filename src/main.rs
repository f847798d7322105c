//! CLI entry point: parses flags/env, installs a tracing subscriber, loads
//! config, runs the engine supervisor until a shutdown signal arrives, and
//! runs the shutdown protocol (spec.md §4.6, §6).

use anyhow::Context;
use clap::Parser;
use kubesee::config::Config;
use kubesee::engine::Engine;
use kubesee::watcher::mock::MockEventSource;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// A Kubernetes event exporter: watches, routes, templates, and ships
/// cluster events to pluggable sinks.
#[derive(Debug, Parser)]
#[command(name = "kubesee", version, about)]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long, env = "KUBESEE_CONFIG")]
    config: PathBuf,

    /// Log level passed to the tracing env-filter (e.g. `info`, `debug`).
    #[arg(long, env = "KUBESEE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Metrics name prefix, overriding the config file's value if set.
    #[arg(long, env = "KUBESEE_METRICS_PREFIX")]
    metrics_prefix: Option<String>,

    /// Shutdown drain timeout, in milliseconds, overriding the config
    /// file's value if set.
    #[arg(long, env = "KUBESEE_DRAIN_TIMEOUT")]
    drain_timeout: Option<u64>,
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut config = Config::load(&cli.config).with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(prefix) = cli.metrics_prefix {
        config.metrics_name_prefix = prefix;
    }
    if let Some(drain_timeout_ms) = cli.drain_timeout {
        config.drain_timeout_ms = drain_timeout_ms;
    }

    info!(message = "starting kubesee", cluster_name = %config.cluster_name);

    // No production Kubernetes client ships in this crate (out of scope);
    // the in-memory double stands in so the pipeline is runnable end to
    // end. An operator wiring a real cluster swaps this for their own
    // `EventSource` implementation.
    let source = Arc::new(MockEventSource::new());
    let engine = Engine::start(config, source).await.context("starting engine")?;

    wait_for_shutdown_signal().await;
    info!(message = "shutdown signal received");

    engine.shutdown().await;
    info!(message = "shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(err) => {
            error!(message = "failed to install SIGTERM handler", %err);
            std::future::pending::<()>().await;
            unreachable!()
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

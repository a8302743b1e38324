mod config;
mod entity;
mod network;
mod tick;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicUsize};
use std::sync::Arc;

use config::ServerConfig;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::load(Path::new("config/server.toml"))?;
    apply_cli_overrides(&mut config);
    let config = Arc::new(config);

    info!(
        "starting pickaxe server on {}:{} (max_view_distance={})",
        config.bind, config.port, config.max_view_distance
    );

    if let Some(path) = &config.cpuprofile {
        info!("cpu profiling requested to {} (no-op in this build)", path.display());
    }
    if let Some(path) = &config.memprofile {
        info!("mem profiling requested to {} (no-op in this build)", path.display());
    }

    let listener = match TcpListener::bind(format!("{}:{}", config.bind, config.port)).await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind listener: {}", e);
            std::process::exit(1);
        }
    };
    info!("listening on {}:{}", config.bind, config.port);

    let next_eid = Arc::new(AtomicI32::new(1));
    let player_count = Arc::new(AtomicUsize::new(0));
    let (join_tx, join_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        let _ = signal_tx.send(true);
    });

    let accept_config = config.clone();
    let accept_player_count = player_count.clone();
    tokio::spawn(network::accept_loop(listener, accept_config, join_tx, accept_player_count));

    tick::run_tick_loop(join_rx, next_eid, player_count, config.max_view_distance, shutdown_rx).await;

    info!("server shut down cleanly");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Applies the CLI surface: `-max-view-distance`, `-cpuprofile`,
/// `-memprofile`. Unrecognized flags are ignored.
fn apply_cli_overrides(config: &mut ServerConfig) {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-max-view-distance" => {
                if let Some(v) = args.next().and_then(|s| s.parse().ok()) {
                    config.max_view_distance = v;
                }
            }
            "-cpuprofile" => {
                if let Some(v) = args.next() {
                    config.cpuprofile = Some(PathBuf::from(v));
                }
            }
            "-memprofile" => {
                if let Some(v) = args.next() {
                    config.memprofile = Some(PathBuf::from(v));
                }
            }
            _ => {}
        }
    }
}

mod config;
mod error;
mod handlers;
mod locking;
mod state;

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use caisson_core::accounts::AccountDatabase;
use caisson_core::config::StoreConfig;
use caisson_core::housekeeping;

use crate::config::ServerSection;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "caisson-server", version, about = "caisson backup store daemon")]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8676")]
    listen: String,

    /// Path of the store configuration file (accounts, disc sets,
    /// housekeeping)
    #[arg(short, long, default_value = "/etc/caisson/caisson.yaml")]
    config: PathBuf,

    /// Log output format: "json" or "pretty"
    #[arg(long, default_value = "pretty")]
    log_format: String,

    /// Number of tokio worker threads (minimum 1)
    #[arg(long, default_value_t = 4, value_parser = parse_min_one)]
    worker_threads: usize,

    /// Maximum number of blocking threads for file I/O (minimum 1)
    #[arg(long, default_value_t = 6, value_parser = parse_min_one)]
    max_blocking_threads: usize,
}

fn parse_min_one(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("{e}"))?;
    if n == 0 {
        return Err("value must be at least 1".into());
    }
    Ok(n)
}

fn main() {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cli.worker_threads)
        .max_blocking_threads(cli.max_blocking_threads)
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error: failed to build tokio runtime: {e}");
            std::process::exit(1);
        });

    runtime.block_on(async_main(cli));
}

async fn async_main(cli: Cli) {
    // Read token from environment
    let token = std::env::var("CAISSON_TOKEN").unwrap_or_default();
    if token.is_empty() {
        eprintln!("Error: CAISSON_TOKEN environment variable must be set");
        std::process::exit(1);
    }

    let config = ServerSection {
        listen: cli.listen,
        store_config: cli.config.display().to_string(),
        token,
        log_format: cli.log_format,
    };

    // Initialize tracing
    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt().json().init();
        }
        _ => {
            tracing_subscriber::fmt().init();
        }
    }

    let store = StoreConfig::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Error: cannot load store configuration: {e}");
        std::process::exit(1);
    });

    let accounts = AccountDatabase::read(&store.account_database).unwrap_or_else(|e| {
        eprintln!("Error: cannot read account database: {e}");
        std::process::exit(1);
    });

    // The housekeeping worker runs on its own thread; the only link to it
    // is the coordinator channel held in the app state.
    let (coordinator, worker) = housekeeping::spawn(store.clone()).unwrap_or_else(|e| {
        eprintln!("Error: cannot spawn housekeeping worker: {e}");
        std::process::exit(1);
    });

    let listen_addr = config.listen.clone();
    let state = AppState::new(config, store, accounts, coordinator);

    spawn_signal_forwarders(state.clone());

    let app = handlers::router(state.clone());

    info!("caisson-server listening on {listen_addr}");
    let listener = TcpListener::bind(&listen_addr).await.unwrap_or_else(|e| {
        eprintln!("Error: cannot bind to {listen_addr}: {e}");
        std::process::exit(1);
    });

    let shutdown_state = state.clone();
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        wait_for_shutdown().await;
        info!("shutdown requested, stopping housekeeping worker");
        shutdown_state.request_housekeeping_terminate();
    });

    if let Err(e) = serve.await {
        error!(error = %e, "server error");
    }

    // Give the worker a chance to finish the account it is on.
    let _ = tokio::task::spawn_blocking(move || {
        if worker.join().is_err() {
            error!("housekeeping worker panicked");
        }
    })
    .await;
}

/// SIGHUP forwards a reload request to the housekeeping worker, mirroring
/// how the admin reloads the daemon's configuration.
fn spawn_signal_forwarders(state: AppState) {
    tokio::spawn(async move {
        let Ok(mut hangup) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
        else {
            error!("cannot install SIGHUP handler");
            return;
        };
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, forwarding reload to housekeeping");
            state.request_housekeeping_reload();
            state.drain_worker_reports();
        }
    });
}

async fn wait_for_shutdown() {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut terminate =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "cannot install SIGTERM handler");
                let _ = ctrl_c.await;
                return;
            }
        };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate.recv() => {}
    }
}

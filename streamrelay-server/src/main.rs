// File: streamrelay-server/src/main.rs

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use streamrelay_common::models::ConnectionState;
use streamrelay_core::{health, DefaultHttpClient, RelayConfig, RunningRelay};

#[derive(Parser, Debug, Clone)]
#[command(name = "streamrelay")]
#[command(author, version, about = "Relays Streamlabs chat messages to an ntfy topic")]
struct Args {
    /// Serve `GET /health` on this address. Without it, `PORT` (if set) is
    /// used on all interfaces.
    #[arg(long)]
    health_addr: Option<SocketAddr>,

    /// Default log level when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Read variables from this file instead of searching for `.env`.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("streamrelay={}", level)));
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {}", e);
    }
}

fn load_env_file(path: Option<&PathBuf>) {
    // A missing file is fine: the process environment may already be complete.
    let _ = match path {
        Some(path) => dotenv::from_path(path),
        None => dotenv::dotenv().map(|_| ()),
    };
}

fn health_addr(args: &Args) -> anyhow::Result<Option<SocketAddr>> {
    if let Some(addr) = args.health_addr {
        return Ok(Some(addr));
    }
    match std::env::var("PORT") {
        Ok(port) if !port.trim().is_empty() => {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("invalid PORT '{}'", port))?;
            Ok(Some(SocketAddr::from(([0, 0, 0, 0], port))))
        }
        _ => Ok(None),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    load_env_file(args.env_file.as_ref());
    init_tracing(&args.log_level);

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(1);
        }
    };

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args, config: RelayConfig) -> anyhow::Result<()> {
    let health_addr = health_addr(&args)?;
    let health_listener = match health_addr {
        Some(addr) => Some(
            TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding health endpoint on {}", addr))?,
        ),
        None => None,
    };

    info!(
        "streamrelay starting. source={}, ntfy={}, topic={}",
        config.event_source_url, config.notify_base_url, config.topic
    );

    let running = RunningRelay::spawn(&config, Arc::new(DefaultHttpClient::new()))
        .context("starting relay")?;

    if let Some(listener) = health_listener {
        let state = running.watch_state();
        tokio::spawn(async move {
            if let Err(e) = health::serve(listener, state).await {
                error!("[Health] server stopped: {}", e);
            }
        });
    }

    let trigger = running.shutdown_trigger();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {:?}", e);
            return;
        }
        info!("Ctrl-C detected; shutting down relay...");
        trigger.trigger();
    });

    let state = running.watch_state();
    running.wait().await;

    if *state.borrow() == ConnectionState::Error {
        anyhow::bail!("event source connection failed and reconnecting is exhausted");
    }
    info!("streamrelay stopped.");
    Ok(())
}

//! Atlantis auth gateway server binary.
//!
//! Loads the auth configuration from a JSON file or `ATLANTIS_*` environment
//! variables, then serves the login flow and gated routes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use atlantis_api::AppState;
use atlantis_api::config::{ApiConfig, GateMode};
use atlantis_core::config::AuthConfig;
use clap::Parser;
use tracing::{info, warn};

/// How often expired sessions and stale login states are purged.
const CLEANUP_PERIOD: Duration = Duration::from_secs(60);

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "atlantis_api_server", about = "Atlantis auth gateway")]
struct Args {
    /// Port to listen on (0 = ephemeral).
    #[arg(long, default_value_t = 4141)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// JSON auth configuration file. Environment variables are used when unset.
    #[arg(long, env = "ATLANTIS_AUTH_CONFIG")]
    auth_config: Option<PathBuf>,

    /// Protect the UI with the single shared Basic credential instead of
    /// sessions and roles.
    #[arg(long, default_value_t = false)]
    legacy_basic_auth: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,atlantis_api=debug,atlantis_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    let auth = match &args.auth_config {
        Some(path) => {
            info!(path = %path.display(), "loading auth configuration file");
            AuthConfig::from_file(path)?
        }
        None => AuthConfig::from_env()?,
    };
    if !auth.secure_cookies {
        warn!("secure cookies are disabled; enable them behind TLS");
    }

    let config = ApiConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        auth,
        gate: if args.legacy_basic_auth {
            GateMode::LegacyBasic
        } else {
            GateMode::Full
        },
    };

    let bind_addr = config.bind_addr.clone();
    let gate = config.gate;
    let state = AppState::from_config(config)?;
    let manager = Arc::clone(&state.auth);
    let cleanup = manager.spawn_cleanup_task(CLEANUP_PERIOD);
    let app = atlantis_api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(
        addr = %local_addr,
        gate = ?gate,
        providers = manager.enabled_providers().len(),
        "atlantis auth gateway listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await;

    cleanup.abort();
    result?;

    Ok(())
}

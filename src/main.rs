//! openrouter-relay HTTP server
//!
//! Starts an Axum web server that relays chat requests to OpenRouter and
//! streams the answers back.

use clap::Parser;
use openrouter_relay::{
    cli::{Cli, Command, generate_config_template},
    config::{Config, UpstreamConfig, load_dotenv},
    handlers::AppState,
    server, telemetry,
    upstream::OpenRouterClient,
};
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = cli.command {
        let template = generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                eprintln!("Wrote configuration template to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    // Load configuration
    let config = Config::from_file_or_default(&cli.config)?;

    // Initialize telemetry
    telemetry::init(&config.observability.log_level);

    if let Some(path) = load_dotenv() {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }

    // Missing credentials are fatal: never start serving without them
    let upstream_config = UpstreamConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Refusing to start");
    })?;

    tracing::info!(
        base_url = %upstream_config.base_url(),
        site_url = %upstream_config.site_url(),
        site_name = %upstream_config.site_name(),
        "Upstream configured"
    );

    let upstream = OpenRouterClient::new(upstream_config)?;
    let state = AppState::new(Arc::new(upstream));
    let app = server::build_router(state, &config.cors)?;

    let addr = config.server.socket_addr()?;

    tracing::info!("Listening on {}", addr);
    tracing::info!("Chat stream available at http://{}/chat/stream", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }
}

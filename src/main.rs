use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use streamable_relay::config::RelayConfig;
use streamable_relay::infrastructure::{staging, video_host};
use streamable_relay::services::orchestrator::UploadOrchestrator;
use streamable_relay::services::worker::StagingSweeper;
use streamable_relay::{AppState, create_app};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Relay video uploads to Streamable
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamable_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Streamable Relay...");

    let config = RelayConfig::from_env();
    info!(
        "🛡️  Relay Config: Max Size={}MB, Poll={}ms x {}, Origins={:?}",
        config.max_file_size / 1024 / 1024,
        config.poll_interval_ms,
        config.max_poll_attempts,
        config.allowed_origins
    );

    let staging_store = staging::setup_staging(&config).await?;
    let host = video_host::setup_video_host(&config)?;

    let orchestrator = Arc::new(UploadOrchestrator::new(
        staging_store.clone(),
        host,
        config.poll_settings(),
        config.max_file_size,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let sweeper = StagingSweeper::new(
        staging_store,
        Duration::from_secs(config.staging_sweep_interval_secs),
        config.staging_max_age(),
        shutdown_rx,
    );
    let sweeper_handle = tokio::spawn(sweeper.run());

    let state = AppState {
        orchestrator,
        config: Arc::new(config),
    };
    let app = create_app(state);

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper_handle.await {
        tracing::error!("Staging sweeper ended abnormally: {}", e);
    }

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}

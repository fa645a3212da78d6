// Main entry point for the MCP gateway

use mcp_gateway::api::{create_router, AppState};
use mcp_gateway::config::Config;
use mcp_gateway::core::resilience::RetryPolicy;
use mcp_gateway::state::redis_store::RedisWindowStore;
use mcp_gateway::state::WindowStore;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // 1. Load and validate configuration first (before any logging)
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // 2. Initialize tracing subscriber with config values
    init_tracing(&config)?;

    info!("Starting MCP gateway");
    info!(
        bind_address = %config.bind_address,
        port = config.port,
        window_secs = config.rate_limit_window_secs,
        default_rate_limit = config.default_rate_limit,
        "Configuration loaded"
    );

    // 3. Connect the shared window store; the gateway still serves without it
    let primary: Option<Arc<dyn WindowStore>> = match config.redis_connection_url()? {
        Some(url) => {
            match RedisWindowStore::connect(
                &url,
                config.redis_connection_timeout(),
                config.redis_operation_timeout(),
                &RetryPolicy::default(),
            )
            .await
            {
                Ok(store) => {
                    info!("Redis connection established");
                    Some(Arc::new(store) as Arc<dyn WindowStore>)
                }
                Err(e) => {
                    warn!(error = %e, "Redis connection failed. Rate limiting will use in-memory storage.");
                    None
                }
            }
        }
        None => {
            info!("Redis disabled, rate limiting will use in-memory storage");
            None
        }
    };

    // 4. Build shared state and router
    let app_state = AppState::from_config(config.clone(), primary).map_err(|e| {
        error!(error = %e, "Failed to initialize application state");
        e
    })?;
    info!(api_keys = app_state.registry.len(), "Key registry initialized");

    let router = create_router(app_state);
    info!("Router created");

    // 5. Start HTTP server
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind to address");
        e
    })?;

    info!(addr = %addr, "Server listening on {}", addr);

    // ConnectInfo gives the rate limiter the peer address of unauthenticated callers
    let make_service = router.into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = %e, "Server error");
            e
        })?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber based on configuration
///
/// `RUST_LOG` takes precedence over `LOG_LEVEL`.
fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_env_filter(filter);

    if config.log_format == "json" {
        subscriber.json().try_init()?;
    } else {
        subscriber.try_init()?;
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            info!("SIGTERM received, starting graceful shutdown");
        },
    }
}

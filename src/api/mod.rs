// Axum web server layer

use axum::{
    error_handling::HandleErrorLayer,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;

pub mod codegen;
pub mod debugger;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod responses;

use crate::auth::auth_middleware::{auth_middleware, AuthState};
use crate::auth::key_registry::KeyRegistry;
use crate::config::Config;
use crate::core::capabilities::CapabilityRegistry;
use crate::core::errors::GatewayError;
use crate::core::models::RequestPolicy;
use crate::engine::handlers::HandlerSet;
use crate::engine::router::ModelRouter;
use crate::metrics::GatewayMetrics;
use crate::state::rate_limiter::SlidingWindowLimiter;
use crate::state::WindowStore;

/// Application state containing all shared dependencies
///
/// All components are wrapped in Arc for shared ownership across async tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<KeyRegistry>,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub router: Arc<ModelRouter>,
    pub metrics: Arc<GatewayMetrics>,
    pub policy: Arc<RequestPolicy>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the gateway from configuration
    ///
    /// `primary` is the shared window store (Redis in production); `None`
    /// runs the limiter on the in-memory store alone.
    pub fn from_config(config: Config, primary: Option<Arc<dyn WindowStore>>) -> Result<Self, GatewayError> {
        let registry = Arc::new(KeyRegistry::from_config(&config)?);
        let handlers = HandlerSet::builtin(config.handler_latency());
        Self::with_parts(config, registry, primary, handlers)
    }

    /// Wire the gateway around an existing registry and handler set
    pub fn with_parts(
        config: Config,
        registry: Arc<KeyRegistry>,
        primary: Option<Arc<dyn WindowStore>>,
        handlers: HandlerSet,
    ) -> Result<Self, GatewayError> {
        let metrics = Arc::new(GatewayMetrics::new()?);
        let limiter = SlidingWindowLimiter::new(primary, config.rate_limit_window_secs)
            .with_metrics(metrics.clone());
        let router = ModelRouter::new(handlers, Arc::new(CapabilityRegistry::builtin()))
            .with_metrics(metrics.clone());

        Ok(Self {
            policy: Arc::new(config.request_policy()),
            config: Arc::new(config),
            registry,
            limiter: Arc::new(limiter),
            router: Arc::new(router),
            metrics,
            started_at: Instant::now(),
        })
    }
}

/// Create the Axum router with all routes and middleware
///
/// Middleware stack (outermost to innermost):
/// - Request context - request ID, start/finish logging, timing header
/// - Security headers (when enabled)
/// - Rate limiting - sliding window per client, exempt paths skipped
/// - Tracing (tower-http::trace)
/// - Request timeout (tower::timeout), mapped to 408
/// - Body size limit (tower-http::limit)
/// - Auth middleware on protected routes only
pub fn create_router(app_state: AppState) -> Router {
    let auth_state = Arc::new(AuthState::new(app_state.registry.clone()));

    let protected = Router::new()
        .route("/mcp", post(handlers::mcp_handler))
        .route("/mcp/batch", post(handlers::batch_handler))
        .nest("/api/v1/codegen", codegen::routes())
        .nest("/api/v1/debugger", debugger::routes())
        .route_layer(from_fn_with_state(auth_state, auth_middleware));

    let public = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/openapi.json", get(handlers::openapi));

    let body_limit = app_state.config.body_size_limit_bytes;
    let timeout_secs = app_state.config.request_timeout_secs;

    // Layers wrap in reverse: the last one added sees the request first
    let timeout_stack = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(middleware::handle_timeout_error))
        .timeout(middleware::request_timeout(timeout_secs));

    let mut router = public
        .merge(protected)
        .layer(middleware::body_size_limit_layer(body_limit))
        .layer(timeout_stack)
        .layer(middleware::tracing_layer())
        .layer(from_fn_with_state(
            app_state.clone(),
            rate_limit::rate_limit_middleware,
        ));

    if app_state.config.security_headers_enabled {
        router = router.layer(from_fn(middleware::security_headers_middleware));
    }

    router
        .layer(from_fn(middleware::request_context_middleware))
        .with_state(app_state)
}

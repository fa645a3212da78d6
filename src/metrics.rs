// Prometheus metrics for admission decisions and dispatches

use prometheus::{opts, Encoder, IntCounter, IntCounterVec, Registry, TextEncoder};

use crate::core::errors::GatewayError;

/// Gateway metric set
///
/// Owns its registry instead of the process-global default, so several
/// gateways (and tests) can coexist in one process.
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    admissions: IntCounterVec,
    fallbacks: IntCounter,
    dispatches: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self, GatewayError> {
        let registry = Registry::new();

        let admissions = IntCounterVec::new(
            opts!(
                "mcp_gateway_rate_limit_decisions_total",
                "Rate limit decisions by backend and outcome"
            ),
            &["backend", "outcome"],
        )
        .map_err(metric_error)?;
        let fallbacks = IntCounter::with_opts(opts!(
            "mcp_gateway_rate_limit_fallbacks_total",
            "Decisions answered by the in-memory store after a Redis failure"
        ))
        .map_err(metric_error)?;
        let dispatches = IntCounterVec::new(
            opts!(
                "mcp_gateway_dispatches_total",
                "Router dispatches by model and outcome"
            ),
            &["model", "outcome"],
        )
        .map_err(metric_error)?;

        registry.register(Box::new(admissions.clone())).map_err(metric_error)?;
        registry.register(Box::new(fallbacks.clone())).map_err(metric_error)?;
        registry.register(Box::new(dispatches.clone())).map_err(metric_error)?;

        Ok(Self {
            registry,
            admissions,
            fallbacks,
            dispatches,
        })
    }

    pub fn record_admission(&self, backend: &str, admitted: bool) {
        let outcome = if admitted { "admitted" } else { "denied" };
        self.admissions.with_label_values(&[backend, outcome]).inc();
    }

    pub fn record_fallback(&self) {
        self.fallbacks.inc();
    }

    pub fn record_dispatch(&self, model: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.dispatches.with_label_values(&[model, outcome]).inc();
    }

    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.get()
    }

    /// Render every metric in the Prometheus text exposition format
    pub fn render(&self) -> Result<String, GatewayError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metric_error)?;
        String::from_utf8(buffer).map_err(|e| GatewayError::Internal(e.to_string()))
    }
}

fn metric_error(e: prometheus::Error) -> GatewayError {
    GatewayError::Internal(format!("metrics: {}", e))
}

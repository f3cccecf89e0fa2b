// packages/engine/src/observability/mod.rs
//! Tracing and metrics
//!
//! Counters are emitted through the `metrics` facade; without an installed
//! recorder they are no-ops, so embedders choose the exporter.

use crate::utils::config::ObservabilityConfig;
use metrics::{counter, describe_counter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Loads by outcome (`mocked`, `real`, `cached`)
pub const LOADS_TOTAL: &str = "rewire_loads_total";

/// Scope closes by result (`ok`, `unused_mock`)
pub const SCOPES_CLOSED_TOTAL: &str = "rewire_scopes_closed_total";

/// Shape validations that failed
pub const VALIDATION_FAILURES_TOTAL: &str = "rewire_validation_failures_total";

/// Interception sessions started
pub const SESSIONS_TOTAL: &str = "rewire_sessions_total";

/// How a load request was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Mocked,
    Real,
    Cached,
}

impl LoadOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mocked => "mocked",
            Self::Real => "real",
            Self::Cached => "cached",
        }
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured filter.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))?;

    if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

/// Register metric descriptions with the installed recorder
pub fn init_metrics() {
    describe_counter!(LOADS_TOTAL, "Module loads routed through the controller, by outcome");
    describe_counter!(SCOPES_CLOSED_TOTAL, "Mock scopes closed, by result");
    describe_counter!(VALIDATION_FAILURES_TOTAL, "Mocks rejected by shape validation");
    describe_counter!(SESSIONS_TOTAL, "Interception sessions enabled");
}

pub fn record_load(outcome: LoadOutcome) {
    counter!(LOADS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_scope_closed(clean: bool) {
    let result = if clean { "ok" } else { "unused_mock" };
    counter!(SCOPES_CLOSED_TOTAL, "result" => result).increment(1);
}

pub fn record_validation_failure() {
    counter!(VALIDATION_FAILURES_TOTAL).increment(1);
}

pub fn record_session_started() {
    counter!(SESSIONS_TOTAL).increment(1);
}

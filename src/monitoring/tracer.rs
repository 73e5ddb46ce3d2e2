/*!
 * Structured Tracing
 * Subscriber setup and timed spans for engine operations
 *
 * Features:
 * - Run IDs for correlating log lines of one process
 * - JSON-formatted logs for structured parsing
 * - Compact human-readable output for development
 */

use std::time::Instant;
use tracing::{debug, info, span, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - IPC_TRACE_JSON: Enable JSON output (default: false)
///
/// A second call is a no-op, so tests may call it freely.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("IPC_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Structured tracing initialized");
    }
}

/// Unique ID for correlating the log lines of one run
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Timed span around one named operation
pub struct OperationSpan {
    span: Span,
    start: Instant,
    name: &'static str,
}

impl OperationSpan {
    pub fn new(name: &'static str, run_id: &str) -> Self {
        let span = span!(
            Level::DEBUG,
            "ipc_op",
            run_id = %run_id,
            op = name,
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
        );
        debug!(parent: &span, op = name, "operation started");
        Self {
            span,
            start: Instant::now(),
            name,
        }
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    /// Record the outcome and the elapsed time
    pub fn finish(self, success: bool) -> u128 {
        let elapsed = self.start.elapsed().as_micros();
        self.span.record("duration_us", elapsed as u64);
        self.span
            .record("result", if success { "success" } else { "error" });
        debug!(parent: &self.span, op = self.name, duration_us = elapsed as u64, success, "operation finished");
        elapsed
    }
}

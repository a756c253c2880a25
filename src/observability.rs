//! Observability module for logging and metrics.
//!
//! This module provides:
//! - Structured logging setup (pretty for terminals, JSON for log shippers)
//! - Metrics recording functions for stage invocations and batch results
//! - Tracing span creation utilities
//!
//! No metrics exporter is installed by the binary; the `metrics` macros are
//! no-ops unless an embedding application installs a recorder.

use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::prelude::*;

use crate::observability_config::{LogFormat, ObservabilityConfig};

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("batch_ocr={}", config.log_level.to_ascii_lowercase()).parse()?);

    match config.log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }

    tracing::debug!(
        log_level = %config.log_level,
        log_format = ?config.log_format,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Span wrapping all work of one pipeline phase
pub fn phase_span(phase: &str) -> tracing::Span {
    tracing::info_span!("phase", phase = %phase)
}

/// Record one stage invocation
pub fn record_stage_metrics(stage: &str, success: bool, duration: Duration, attempts: u32) {
    let stage = stage.to_string();
    metrics::counter!(
        "stage_invocations_total",
        "stage" => stage.clone(),
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
    metrics::histogram!("stage_duration_seconds", "stage" => stage.clone())
        .record(duration.as_secs_f64());
    metrics::histogram!("stage_attempts", "stage" => stage).record(f64::from(attempts));
}

/// Record the final per-file counts of a batch
pub fn record_batch_metrics(succeeded: usize, failed: usize, skipped: usize) {
    metrics::counter!("batch_files_total", "result" => "succeeded").increment(succeeded as u64);
    metrics::counter!("batch_files_total", "result" => "failed").increment(failed as u64);
    metrics::counter!("batch_files_total", "result" => "skipped").increment(skipped as u64);
}

/// Record a circuit breaker opening for a stage
pub fn record_circuit_breaker_open(stage: &str) {
    metrics::counter!("circuit_breaker_open_total", "stage" => stage.to_string()).increment(1);
}

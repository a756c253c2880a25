//! # Application Error Types
//!
//! This module defines common error types used throughout the batch OCR pipeline.
//! It provides structured error handling for the configuration layer, the
//! filesystem scans and the external tool invocations.

use thiserror::Error;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    /// Configuration validation errors
    #[error("[CONFIG] {0}")]
    Config(String),
    /// File system errors
    #[error("[FILESYSTEM] {0}")]
    FileSystem(String),
    /// Batch precondition failures
    #[error("[GATE] {0}")]
    Gate(String),
    /// Internal application errors
    #[error("[INTERNAL] {0}")]
    Internal(String),
}

/// Exit code when the batch stopped before touching any file
pub const EXIT_GATE_FAILED: u8 = 1;
/// Exit code when the batch ran but some files failed or were skipped
pub const EXIT_PARTIAL_FAILURE: u8 = 2;
/// Exit code for invalid flags, environment variables or settings
pub const EXIT_CONFIG_ERROR: u8 = 3;
/// Exit code for failures outside the batch itself
pub const EXIT_RUNTIME_ERROR: u8 = 4;

impl AppError {
    /// Process exit code for an error that ends the run
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) => EXIT_CONFIG_ERROR,
            AppError::Gate(_) => EXIT_GATE_FAILED,
            AppError::FileSystem(_) | AppError::Internal(_) => EXIT_RUNTIME_ERROR,
        }
    }
}

impl From<crate::pipeline::GateError> for AppError {
    fn from(err: crate::pipeline::GateError) -> Self {
        AppError::Gate(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the pipeline
pub mod error_logging {
    use std::path::Path;
    use tracing::error;

    /// Log an external process failure with the stage and file it belongs to
    pub fn log_process_error(
        error: &impl std::fmt::Display,
        stage: &str,
        file: &Path,
        attempt: u32,
        duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            stage = %stage,
            file = %file.display(),
            attempt = attempt,
            duration_ms = ?duration.map(|d| d.as_millis()),
            "External process failed"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_filesystem_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&Path>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path.map(|p| p.display().to_string()),
            "File system operation failed"
        );
    }

    /// Log validation errors with input context
    pub fn log_validation_error(
        error: &impl std::fmt::Display,
        operation: &str,
        input_type: &str,
        input_value: Option<&str>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            input_type = %input_type,
            input_value = ?input_value.map(|v| if v.chars().count() > 100 { format!("{}...", v.chars().take(100).collect::<String>()) } else { v.to_string() }),
            "Validation failed"
        );
    }

    /// Log configuration errors during startup
    pub fn log_config_error(
        error: &impl std::fmt::Display,
        config_key: &str,
        operation: &str,
    ) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}

//! # External Tool Configuration Module
//!
//! This module defines configuration structures for the external tools the
//! pipeline drives, including executable names, recovery settings and
//! per-invocation timeouts.

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

// Constants for tool configuration
pub const DEFAULT_IMAGE_TOOL: &str = "convert";
pub const DEFAULT_OCR_TOOL: &str = "tesseract";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Recovery configuration for error handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Number of extra attempts after a failed invocation
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for a single external invocation in seconds
    pub operation_timeout_secs: u64,
    /// Consecutive failures within a stage before the stage is abandoned
    pub circuit_breaker_threshold: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 5000,
            operation_timeout_secs: DEFAULT_TIMEOUT_SECS,
            circuit_breaker_threshold: 5,
        }
    }
}

impl RecoveryConfig {
    /// Validate recovery configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.max_retries > 0 && self.base_retry_delay_ms == 0 {
            return Err(AppError::Config(
                "base_retry_delay_ms must be greater than 0 when retries are enabled".to_string(),
            ));
        }
        if self.max_retry_delay_ms < self.base_retry_delay_ms {
            return Err(AppError::Config(format!(
                "max_retry_delay_ms ({}) must be >= base_retry_delay_ms ({})",
                self.max_retry_delay_ms, self.base_retry_delay_ms
            )));
        }
        if self.operation_timeout_secs == 0 {
            return Err(AppError::Config(
                "operation_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.operation_timeout_secs > MAX_TIMEOUT_SECS {
            return Err(AppError::Config(format!(
                "operation_timeout_secs cannot be greater than {} seconds",
                MAX_TIMEOUT_SECS
            )));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(AppError::Config(
                "circuit_breaker_threshold must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Executables used by the stage invokers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Image processor used for grayscale, threshold and format conversion
    pub image_tool: String,
    /// OCR engine producing `<stem>.txt`
    pub ocr_tool: String,
    /// Recovery and timeout settings shared by every invocation
    pub recovery: RecoveryConfig,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            image_tool: DEFAULT_IMAGE_TOOL.to_string(),
            ocr_tool: DEFAULT_OCR_TOOL.to_string(),
            recovery: RecoveryConfig::default(),
        }
    }
}

impl ToolConfig {
    /// Validate tool configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.image_tool.trim().is_empty() {
            return Err(AppError::Config("image_tool cannot be empty".to_string()));
        }
        if self.ocr_tool.trim().is_empty() {
            return Err(AppError::Config("ocr_tool cannot be empty".to_string()));
        }
        self.recovery.validate()
    }
}

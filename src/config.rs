//! # Unified Application Configuration
//!
//! All settings of a batch run live in [`AppConfig`]: what to scan and how to
//! filter ([`PipelineConfig`]), which tools to drive ([`ToolConfig`]) and how
//! to log ([`ObservabilityConfig`]). Values come from CLI flags or environment
//! variables in `main.rs`; everything here has a documented default and a
//! `validate()` method.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{error_logging, AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use crate::path_validation::{validate_extension, validate_language};
use crate::tool_config::ToolConfig;

pub const DEFAULT_INPUT_DIR: &str = ".";
pub const DEFAULT_INPUT_EXT: &str = ".jpg";
pub const DEFAULT_THRESHOLD: u8 = 75;
pub const DEFAULT_LANG: &str = "eng";
pub const MAX_THRESHOLD: u8 = 100;

/// What the batch processes and with which parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory scanned (non-recursively) for inputs
    pub input_dir: PathBuf,
    /// Suffix of input files, including the leading dot. The only place the
    /// input extension is defined.
    pub input_ext: String,
    /// Threshold filter strength, percent (0-100)
    pub threshold: u8,
    /// OCR language, `eng` or `eng+fra` style
    pub lang: String,
    /// Convert to grayscale before thresholding
    pub grayscale: bool,
    /// Re-scan the directory before each phase and log divergences
    pub rescan: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            input_ext: DEFAULT_INPUT_EXT.to_string(),
            threshold: DEFAULT_THRESHOLD,
            lang: DEFAULT_LANG.to_string(),
            grayscale: false,
            rescan: false,
        }
    }
}

impl PipelineConfig {
    /// Validate pipeline configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.input_dir.as_os_str().is_empty() {
            return Err(AppError::Config("input_dir cannot be empty".to_string()));
        }

        validate_extension(&self.input_ext).map_err(|e| {
            error_logging::log_config_error(&e, "input_ext", "validate");
            AppError::Config(format!("input_ext is invalid: {}", e))
        })?;

        if self.input_ext.eq_ignore_ascii_case(crate::naming::BITMAP_EXT) {
            return Err(AppError::Config(format!(
                "input_ext cannot be {}, it is the intermediate bitmap format",
                crate::naming::BITMAP_EXT
            )));
        }

        if self.threshold > MAX_THRESHOLD {
            return Err(AppError::Config(format!(
                "threshold ({}) must be between 0 and {}",
                self.threshold, MAX_THRESHOLD
            )));
        }

        validate_language(&self.lang).map_err(|e| {
            error_logging::log_config_error(&e, "lang", "validate");
            AppError::Config(format!("lang is invalid: {}", e))
        })?;

        let bare_ext = self.input_ext.trim_start_matches('.');
        if image::ImageFormat::from_extension(bare_ext).is_none() {
            warn!(
                input_ext = %self.input_ext,
                "Input extension is not a recognised image format, continuing anyway"
            );
        }

        Ok(())
    }
}

/// Complete configuration of a batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub tools: ToolConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Validate every section
    pub fn validate(&self) -> AppResult<()> {
        self.pipeline.validate()?;
        self.tools.validate()?;
        self.observability.validate().map_err(AppError::Config)?;
        Ok(())
    }
}

//! # Batch Report
//!
//! Per-file failures never abort a batch. They are collected here and
//! summarised once the last phase has run.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{AppError, AppResult};

/// Counters for one stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub stage: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// One file that did not make it through a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub file: PathBuf,
    pub stage: String,
    /// Machine-friendly failure class
    pub kind: String,
    pub reason: String,
    /// Tool invocations made for this file in this stage
    pub attempts: u32,
}

/// Outcome of a whole batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub input_dir: PathBuf,
    pub input_ext: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Whether the image processor answered its version probe
    pub image_tool_available: bool,
    /// Originals discovered by the initial scan
    pub inputs: usize,
    /// Text files produced
    pub outputs: Vec<PathBuf>,
    pub stages: Vec<StageSummary>,
    pub failures: Vec<FileFailure>,
    /// Files not attempted because a stage's circuit breaker opened
    pub skipped: Vec<FileFailure>,
}

impl BatchReport {
    pub fn new(input_dir: &Path, input_ext: &str) -> Self {
        Self {
            input_dir: input_dir.to_path_buf(),
            input_ext: input_ext.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            image_tool_available: false,
            inputs: 0,
            outputs: Vec::new(),
            stages: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn stage_mut(&mut self, stage: &str) -> &mut StageSummary {
        if let Some(idx) = self.stages.iter().position(|s| s.stage == stage) {
            return &mut self.stages[idx];
        }
        self.stages.push(StageSummary {
            stage: stage.to_string(),
            ..Default::default()
        });
        let last = self.stages.len() - 1;
        &mut self.stages[last]
    }

    /// Register a stage so it appears in the summary even if it ran on no files
    pub fn begin_stage(&mut self, stage: &str) {
        self.stage_mut(stage);
    }

    pub fn record_success(&mut self, stage: &str) {
        let summary = self.stage_mut(stage);
        summary.attempted += 1;
        summary.succeeded += 1;
    }

    pub fn record_failure(
        &mut self,
        stage: &str,
        file: &Path,
        kind: &str,
        reason: impl Into<String>,
        attempts: u32,
    ) {
        let summary = self.stage_mut(stage);
        summary.attempted += 1;
        summary.failed += 1;
        self.failures.push(FileFailure {
            file: file.to_path_buf(),
            stage: stage.to_string(),
            kind: kind.to_string(),
            reason: reason.into(),
            attempts,
        });
    }

    pub fn record_skip(&mut self, stage: &str, file: &Path, reason: impl Into<String>) {
        self.stage_mut(stage).skipped += 1;
        self.skipped.push(FileFailure {
            file: file.to_path_buf(),
            stage: stage.to_string(),
            kind: "circuit_open".to_string(),
            reason: reason.into(),
            attempts: 0,
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Originals that produced a text file
    pub fn succeeded(&self) -> usize {
        self.outputs.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// `true` when every input produced text
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Internal(format!("Failed to serialize report: {}", e)))
    }

    /// Write the JSON report to `path`
    pub fn write_json(&self, path: &Path) -> AppResult<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| {
            crate::errors::error_logging::log_filesystem_error(&e, "write_report", Some(path));
            AppError::FileSystem(format!("Failed to write report to {}: {}", path.display(), e))
        })
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Processed {} '{}' file(s) in {}: {} succeeded, {} failed, {} skipped",
            self.inputs,
            self.input_ext,
            self.input_dir.display(),
            self.succeeded(),
            self.failed(),
            self.skipped_count()
        )?;
        if !self.image_tool_available {
            writeln!(f, "  WARNING image tool did not answer its version probe")?;
        }
        for stage in &self.stages {
            writeln!(
                f,
                "  {:<10} attempted {:>4}  ok {:>4}  failed {:>4}  skipped {:>4}",
                stage.stage, stage.attempted, stage.succeeded, stage.failed, stage.skipped
            )?;
        }
        for failure in &self.failures {
            writeln!(
                f,
                "  FAILED  [{}] {}: {}",
                failure.stage,
                failure.file.display(),
                failure.reason
            )?;
        }
        for skip in &self.skipped {
            writeln!(f, "  SKIPPED [{}] {}: {}", skip.stage, skip.file.display(), skip.reason)?;
        }
        Ok(())
    }
}

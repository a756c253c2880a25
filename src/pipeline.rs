//! # Pipeline Driver
//!
//! Runs a batch through its stages, one file and one external process at a
//! time:
//!
//! ```text
//! discover inputs ──empty──► GateError::NoInputFiles
//!      │
//! probe OCR engine ──unavailable──► GateError::ToolUnavailable
//!      │
//! [grayscale] ─► filter ─► convert ─► ocr ─► BatchReport
//! ```
//!
//! The files that succeed in one stage are handed directly to the next, so a
//! file that fails drops out of the rest of the batch and is listed in the
//! report. Re-scanning the directory between phases is only a consistency
//! check (see [`PipelineConfig::rescan`]); it never changes the work list.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn, Instrument};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::PipelineConfig;
use crate::locator::{find_files, Batch, ImageFile};
use crate::naming;
use crate::observability;
use crate::process::CommandRunner;
use crate::report::BatchReport;
use crate::stages::{Stage, StageCommand, StageError};
use crate::tool_config::ToolConfig;
use crate::tools::{self, ToolStatus};

/// Preconditions that stop a batch before any file is touched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("OCR engine is not available: {0}")]
    ToolUnavailable(String),
    #[error("Did not find any '{ext}' files to process in {}", .dir.display())]
    NoInputFiles { dir: PathBuf, ext: String },
}

/// Batch driver over an injectable [`CommandRunner`]
pub struct Pipeline {
    config: PipelineConfig,
    tools: ToolConfig,
    runner: Arc<dyn CommandRunner>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, tools: ToolConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            tools,
            runner,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stages in execution order
    pub fn stages(&self) -> Vec<Stage> {
        let ext = self.config.input_ext.clone();
        let mut stages = Vec::with_capacity(4);
        if self.config.grayscale {
            stages.push(Stage::Grayscale { ext: ext.clone() });
        }
        stages.push(Stage::Filter {
            ext: ext.clone(),
            threshold: self.config.threshold,
        });
        stages.push(Stage::Convert { ext });
        stages.push(Stage::Ocr {
            lang: self.config.lang.clone(),
        });
        stages
    }

    /// Scan for original inputs, leaving out outputs of earlier runs
    pub fn discover_inputs(&self) -> Batch {
        let ext = &self.config.input_ext;
        let mut batch = find_files(&self.config.input_dir, ext);
        let before = batch.len();
        batch.retain(|file| !naming::is_derived(file.file_name(), ext));
        if batch.len() < before {
            debug!(
                excluded = before - batch.len(),
                "Excluded pipeline outputs from a previous run"
            );
        }
        batch
    }

    /// Discover inputs and probe the OCR engine.
    ///
    /// An empty directory is reported without launching anything.
    pub async fn check_gate(&self) -> Result<Batch, GateError> {
        let inputs = self.discover_inputs();
        if inputs.is_empty() {
            return Err(GateError::NoInputFiles {
                dir: self.config.input_dir.clone(),
                ext: self.config.input_ext.clone(),
            });
        }

        match tools::check_ocr_engine(self.runner.as_ref(), &self.tools).await {
            ToolStatus::Available { .. } => Ok(inputs),
            ToolStatus::Unavailable { reason } => Err(GateError::ToolUnavailable(reason)),
        }
    }

    /// Commands every input would go through, without running anything.
    ///
    /// Each stage's command is built from the previous stage's expected output.
    pub fn plan(&self, inputs: &Batch) -> Vec<Result<StageCommand, StageError>> {
        let stages = self.stages();
        let mut planned = Vec::new();
        for input in inputs {
            let mut current = input.clone();
            for stage in &stages {
                match stage.command(&current, &self.tools) {
                    Ok(command) => {
                        let next = ImageFile::from_path(command.output.clone());
                        planned.push(Ok(command));
                        match next {
                            Some(next) => current = next,
                            None => break,
                        }
                    }
                    Err(err) => {
                        planned.push(Err(err));
                        break;
                    }
                }
            }
        }
        planned
    }

    /// Run the whole batch
    pub async fn run(&self) -> Result<BatchReport, GateError> {
        let mut report = BatchReport::new(&self.config.input_dir, &self.config.input_ext);

        let inputs = match self.check_gate().await {
            Ok(inputs) => inputs,
            Err(err) => {
                warn!(error = %err, "Batch aborted before processing");
                return Err(err);
            }
        };
        report.inputs = inputs.len();
        info!(
            dir = %self.config.input_dir.display(),
            ext = %self.config.input_ext,
            files = inputs.len(),
            "Starting batch"
        );

        report.image_tool_available = tools::check_image_tool(self.runner.as_ref(), &self.tools)
            .await
            .is_available();

        let mut batch = inputs;
        for stage in self.stages() {
            if self.config.rescan {
                self.rescan_check(&stage, &batch);
            }
            batch = self
                .run_phase(&stage, batch, &mut report)
                .instrument(observability::phase_span(stage.name()))
                .await;
        }

        report.outputs = batch.paths();
        report.finish();
        observability::record_batch_metrics(
            report.succeeded(),
            report.failed(),
            report.skipped_count(),
        );
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped_count(),
            "Batch finished"
        );
        Ok(report)
    }

    async fn run_phase(&self, stage: &Stage, inputs: Batch, report: &mut BatchReport) -> Batch {
        report.begin_stage(stage.name());
        let breaker = CircuitBreaker::new(&self.tools.recovery);
        let mut outputs = Vec::with_capacity(inputs.len());

        for file in inputs {
            if breaker.is_open() {
                report.record_skip(
                    stage.name(),
                    file.path(),
                    format!(
                        "{} consecutive failures in this stage",
                        breaker.consecutive_failures()
                    ),
                );
                continue;
            }

            let start = Instant::now();
            match stage.run(self.runner.as_ref(), &file, &self.tools).await {
                Ok(success) => {
                    breaker.record_success();
                    observability::record_stage_metrics(
                        stage.name(),
                        true,
                        success.duration,
                        success.attempts,
                    );
                    report.record_success(stage.name());
                    outputs.push(success.output);
                }
                Err(err) => {
                    warn!(
                        stage = stage.name(),
                        file = %file.path().display(),
                        error = %err,
                        "File failed, continuing with the rest of the batch"
                    );
                    observability::record_stage_metrics(
                        stage.name(),
                        false,
                        start.elapsed(),
                        err.attempts(),
                    );
                    report.record_failure(
                        stage.name(),
                        file.path(),
                        err.kind(),
                        err.to_string(),
                        err.attempts(),
                    );
                    if breaker.record_failure() {
                        warn!(
                            stage = stage.name(),
                            threshold = self.tools.recovery.circuit_breaker_threshold,
                            "Circuit breaker opened, skipping the rest of this stage"
                        );
                        observability::record_circuit_breaker_open(stage.name());
                    }
                }
            }
        }

        Batch::new(outputs)
    }

    /// Suffix the directory is re-scanned with before `stage` runs
    fn rescan_suffix(&self, stage: &Stage) -> Option<String> {
        match stage {
            Stage::Convert { ext } => Some(naming::filtered_suffix(ext)),
            Stage::Ocr { .. } => Some(naming::bitmap_suffix()),
            Stage::Grayscale { .. } | Stage::Filter { .. } => None,
        }
    }

    /// Compare the threaded work list with what is on disk, logging differences
    fn rescan_check(&self, stage: &Stage, batch: &Batch) {
        let Some(suffix) = self.rescan_suffix(stage) else {
            return;
        };
        let on_disk: BTreeSet<PathBuf> = find_files(&self.config.input_dir, &suffix)
            .paths()
            .into_iter()
            .collect();
        let tracked: BTreeSet<PathBuf> = batch.paths().into_iter().collect();

        for path in on_disk.difference(&tracked) {
            warn!(
                stage = stage.name(),
                path = %path.display(),
                "File on disk is not part of this batch"
            );
        }
        for path in tracked.difference(&on_disk) {
            warn!(
                stage = stage.name(),
                path = %path.display(),
                "Batch file is missing from the directory scan"
            );
        }
        debug!(
            stage = stage.name(),
            on_disk = on_disk.len(),
            tracked = tracked.len(),
            "Rescan consistency check done"
        );
    }
}

//! # Stage Invokers
//!
//! Each stage turns one input file into one new sibling file by running an
//! external tool:
//!
//! | Stage | Command | Output |
//! |---|---|---|
//! | grayscale | `<image_tool> -type Grayscale <in> <out>` | `stem_y.ext` |
//! | filter | `<image_tool> -threshold <t>% <in> <out>` | `stem_m.ext` |
//! | convert | `<image_tool> <in> <out>` | `stem.tif` |
//! | ocr | `<ocr_tool> <in> <out_stem> -l <lang>` | `out_stem.txt` |
//!
//! Building a command is pure and fails with [`StageError`] rather than
//! producing a malformed path. Running a command succeeds only when the tool
//! exits 0 and the expected output exists afterwards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::errors::error_logging;
use crate::locator::ImageFile;
use crate::naming;
use crate::path_validation::validate_filename;
use crate::process::{run_with_retry, CommandRunner, Invocation};
use crate::process_errors::ProcessError;
use crate::tool_config::ToolConfig;

/// Why a stage could not produce its output for a file
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    #[error("'{file}' does not end with '{expected}'")]
    UnexpectedExtension { file: String, expected: String },
    #[error("derived output name '{name}' is invalid: {reason}")]
    InvalidOutputName { name: String, reason: String },
    #[error("output '{}' would overwrite the input", .path.display())]
    WouldOverwrite { path: PathBuf },
    #[error("{source}")]
    Process { source: ProcessError, attempts: u32 },
    #[error("tool reported success but '{}' was not created", .path.display())]
    MissingOutput { path: PathBuf, attempts: u32 },
    #[error("could not remove stale output '{}': {reason}", .path.display())]
    StaleOutput { path: PathBuf, reason: String },
}

impl StageError {
    /// Short label used in reports and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::UnexpectedExtension { .. } => "unexpected_extension",
            StageError::InvalidOutputName { .. } => "invalid_output_name",
            StageError::WouldOverwrite { .. } => "would_overwrite",
            StageError::Process { source, .. } => source.kind(),
            StageError::MissingOutput { .. } => "missing_output",
            StageError::StaleOutput { .. } => "stale_output",
        }
    }

    /// Invocations made before giving up; 0 when the tool was never launched
    pub fn attempts(&self) -> u32 {
        match self {
            StageError::Process { attempts, .. } | StageError::MissingOutput { attempts, .. } => {
                *attempts
            }
            _ => 0,
        }
    }
}

/// A stage together with its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Grayscale { ext: String },
    Filter { ext: String, threshold: u8 },
    Convert { ext: String },
    Ocr { lang: String },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Grayscale { .. } => "grayscale",
            Stage::Filter { .. } => "filter",
            Stage::Convert { .. } => "convert",
            Stage::Ocr { .. } => "ocr",
        }
    }

    /// Build the command this stage would run for `file`
    pub fn command(&self, file: &ImageFile, tools: &ToolConfig) -> Result<StageCommand, StageError> {
        match self {
            Stage::Grayscale { ext } => grayscale_command(file, ext, tools),
            Stage::Filter { ext, threshold } => filter_command(file, ext, *threshold, tools),
            Stage::Convert { ext } => convert_command(file, ext, tools),
            Stage::Ocr { lang } => ocr_command(file, lang, tools),
        }
    }

    /// Run this stage for one file and wait for it to finish
    pub async fn run(
        &self,
        runner: &dyn CommandRunner,
        file: &ImageFile,
        tools: &ToolConfig,
    ) -> Result<StageSuccess, StageError> {
        let command = self.command(file, tools)?;
        execute(runner, &command, tools).await
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A ready-to-run command and the file it is expected to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    pub stage: &'static str,
    pub input: PathBuf,
    pub output: PathBuf,
    pub invocation: Invocation,
}

/// A stage that produced its output
#[derive(Debug, Clone)]
pub struct StageSuccess {
    pub output: ImageFile,
    pub attempts: u32,
    pub duration: Duration,
}

fn derived_output(
    file: &ImageFile,
    ext: &str,
    derive: impl Fn(&str, &str) -> Option<String>,
) -> Result<PathBuf, StageError> {
    let name = derive(file.file_name(), ext).ok_or_else(|| StageError::UnexpectedExtension {
        file: file.file_name().to_string(),
        expected: ext.to_string(),
    })?;
    validate_filename(&name).map_err(|e| {
        error_logging::log_validation_error(&e, "derive_output", "file_name", Some(&name));
        StageError::InvalidOutputName {
            name: name.clone(),
            reason: e.to_string(),
        }
    })?;
    let output = file.sibling(&name);
    if output == file.path() {
        return Err(StageError::WouldOverwrite { path: output });
    }
    Ok(output)
}

/// `<image_tool> -type Grayscale <in> <stem>_y<ext>`
pub fn grayscale_command(
    file: &ImageFile,
    ext: &str,
    tools: &ToolConfig,
) -> Result<StageCommand, StageError> {
    let output = derived_output(file, ext, naming::grayscale_name)?;
    let invocation = Invocation::new(&tools.image_tool)
        .arg("-type")
        .arg("Grayscale")
        .arg(file.path())
        .arg(&output);
    Ok(StageCommand {
        stage: "grayscale",
        input: file.path().to_path_buf(),
        output,
        invocation,
    })
}

/// `<image_tool> -threshold <t>% <in> <stem>_m<ext>`
pub fn filter_command(
    file: &ImageFile,
    ext: &str,
    threshold: u8,
    tools: &ToolConfig,
) -> Result<StageCommand, StageError> {
    let output = derived_output(file, ext, naming::filtered_name)?;
    let invocation = Invocation::new(&tools.image_tool)
        .arg("-threshold")
        .arg(format!("{}%", threshold))
        .arg(file.path())
        .arg(&output);
    Ok(StageCommand {
        stage: "filter",
        input: file.path().to_path_buf(),
        output,
        invocation,
    })
}

/// `<image_tool> <in> <stem>.tif`
pub fn convert_command(
    file: &ImageFile,
    ext: &str,
    tools: &ToolConfig,
) -> Result<StageCommand, StageError> {
    let output = derived_output(file, ext, naming::bitmap_name)?;
    let invocation = Invocation::new(&tools.image_tool)
        .arg(file.path())
        .arg(&output);
    Ok(StageCommand {
        stage: "convert",
        input: file.path().to_path_buf(),
        output,
        invocation,
    })
}

/// `<ocr_tool> <in> <stem> -l <lang>`; the engine writes `<stem>.txt`
pub fn ocr_command(
    file: &ImageFile,
    lang: &str,
    tools: &ToolConfig,
) -> Result<StageCommand, StageError> {
    let output = derived_output(file, naming::BITMAP_EXT, |name, _| {
        naming::text_stem(name).map(|stem| format!("{stem}{}", naming::TEXT_EXT))
    })?;
    let output_stem = output.with_extension("");
    let invocation = Invocation::new(&tools.ocr_tool)
        .arg(file.path())
        .arg(&output_stem)
        .arg("-l")
        .arg(lang);
    Ok(StageCommand {
        stage: "ocr",
        input: file.path().to_path_buf(),
        output,
        invocation,
    })
}

async fn output_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Delete an output left by an earlier run so it cannot pass for a new one
async fn remove_stale_output(path: &Path) -> Result<(), StageError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed output of a previous run");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            error_logging::log_filesystem_error(&e, "remove_stale_output", Some(path));
            Err(StageError::StaleOutput {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    }
}

/// Run a built command, verifying that its output appeared
pub async fn execute(
    runner: &dyn CommandRunner,
    command: &StageCommand,
    tools: &ToolConfig,
) -> Result<StageSuccess, StageError> {
    let start = Instant::now();
    debug!(stage = command.stage, command = %command.invocation, "Running stage command");
    remove_stale_output(&command.output).await?;

    let outcome = run_with_retry(
        runner,
        &command.invocation,
        &tools.recovery,
        command.stage,
        &command.input,
    )
    .await;
    let attempts = outcome.attempts;
    if let Err(source) = outcome.result {
        return Err(StageError::Process { source, attempts });
    }

    if !output_exists(&command.output).await {
        return Err(StageError::MissingOutput {
            path: command.output.clone(),
            attempts,
        });
    }

    let output = ImageFile::from_path(command.output.clone()).ok_or_else(|| {
        StageError::InvalidOutputName {
            name: command.output.display().to_string(),
            reason: "not valid UTF-8".to_string(),
        }
    })?;

    let duration = start.elapsed();
    info!(
        stage = command.stage,
        input = %command.input.display(),
        output = %command.output.display(),
        attempts,
        duration_ms = duration.as_millis(),
        "Stage completed"
    );
    Ok(StageSuccess {
        output,
        attempts,
        duration,
    })
}

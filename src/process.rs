//! # External Process Execution
//!
//! Every stage hands its work to an external executable. This module is the
//! single seam through which those executables are launched:
//!
//! - [`Invocation`] is a program plus its argument vector (no shell is involved)
//! - [`CommandRunner`] launches an invocation and waits for it to finish
//! - [`SystemRunner`] is the real implementation on top of `tokio::process`
//! - [`run_with_retry`] wraps a runner with exponential backoff
//!
//! Runners report launch failures and timeouts as [`ProcessError`]; a process
//! that ran to completion is always an `Ok(ProcessOutput)`, whatever its exit
//! status. [`ProcessOutput::into_result`] turns a non-zero exit into an error.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::error_logging;
use crate::process_errors::ProcessError;
use crate::tool_config::RecoveryConfig;

/// Longest stderr excerpt kept in errors and reports
const STDERR_EXCERPT_CHARS: usize = 500;

/// A fully-built external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Arguments rendered lossily, for logs and assertions
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Outcome of a process that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Convert a non-zero or signalled exit into a [`ProcessError`]
    pub fn into_result(self, program: &str) -> Result<ProcessOutput, ProcessError> {
        match self.exit_code {
            Some(0) => Ok(self),
            Some(code) => Err(ProcessError::NonZeroExit {
                program: program.to_string(),
                code,
                stderr: stderr_excerpt(&self.stderr),
            }),
            None => Err(ProcessError::Signaled {
                program: program.to_string(),
            }),
        }
    }
}

/// Trimmed, length-limited stderr for error messages
pub fn stderr_excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.chars().count() > STDERR_EXCERPT_CHARS {
        let head: String = trimmed.chars().take(STDERR_EXCERPT_CHARS).collect();
        format!("{head}...")
    } else {
        trimmed.to_string()
    }
}

/// Launches external commands and waits for them to exit
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError>;
}

/// Runs commands as real child processes with a per-invocation timeout
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_recovery(recovery: &RecoveryConfig) -> Self {
        Self::new(Duration::from_secs(recovery.operation_timeout_secs))
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError> {
        let program = invocation.program().to_string();
        debug!(command = %invocation, "Launching external process");

        let child = tokio::process::Command::new(&program)
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::Spawn {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        let start = Instant::now();
        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ProcessError::Io {
                    program,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ProcessError::Timeout {
                    program,
                    limit: self.timeout,
                })
            }
        };

        let result = ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: start.elapsed(),
        };
        debug!(
            command = %invocation,
            exit_code = ?result.exit_code,
            duration_ms = result.duration.as_millis(),
            "External process finished"
        );
        Ok(result)
    }
}

/// Calculate retry delay with exponential backoff
///
/// ```text
/// delay = min(base_delay * (2^(attempt-1)), max_delay)
/// final_delay = delay + random(0, delay/4)
/// ```
///
/// `attempt` is the 1-based number of the retry about to happen.
///
/// ```rust
/// use batch_ocr::process::calculate_retry_delay;
/// use batch_ocr::tool_config::RecoveryConfig;
///
/// let config = RecoveryConfig { base_retry_delay_ms: 1000, max_retry_delay_ms: 10000, ..Default::default() };
/// let first = calculate_retry_delay(1, &config);
/// assert!((1000..=1250).contains(&first));
/// ```
pub fn calculate_retry_delay(attempt: u32, recovery: &RecoveryConfig) -> u64 {
    let exponent = attempt.saturating_sub(1).min(32);
    let delay = recovery
        .base_retry_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(recovery.max_retry_delay_ms);

    // Jitter keeps retries of neighbouring files from lining up
    let jitter = rand::random_range(0..=delay / 4);
    delay + jitter
}

/// Result of [`run_with_retry`]
#[derive(Debug)]
pub struct RetryOutcome {
    pub result: Result<ProcessOutput, ProcessError>,
    /// Number of attempts made, at least 1
    pub attempts: u32,
}

/// Run `invocation`, retrying failed attempts up to `recovery.max_retries` times.
///
/// An attempt fails when the runner errors or the process exits non-zero.
pub async fn run_with_retry(
    runner: &dyn CommandRunner,
    invocation: &Invocation,
    recovery: &RecoveryConfig,
    stage: &str,
    file: &Path,
) -> RetryOutcome {
    let max_attempts = recovery.max_retries + 1;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let start = Instant::now();
        let result = runner
            .run(invocation)
            .await
            .and_then(|output| output.into_result(invocation.program()));

        match result {
            Ok(output) => {
                return RetryOutcome {
                    result: Ok(output),
                    attempts: attempt,
                }
            }
            Err(err) => {
                error_logging::log_process_error(
                    &err,
                    stage,
                    file,
                    attempt,
                    Some(start.elapsed()),
                );
                if attempt >= max_attempts {
                    return RetryOutcome {
                        result: Err(err),
                        attempts: attempt,
                    };
                }
                let delay_ms = calculate_retry_delay(attempt, recovery);
                warn!(
                    stage = %stage,
                    file = %file.display(),
                    attempt,
                    delay_ms,
                    "Retrying external process"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

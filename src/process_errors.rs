//! # Process Error Types Module
//!
//! Error types for launching and supervising external tools. Every failure
//! mode of a child process is normalized into one of these variants so the
//! pipeline can record it per file instead of aborting the batch.

use std::time::Duration;

use thiserror::Error;

/// Custom error types for external process operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessError {
    /// The executable could not be launched (missing, not executable, ...)
    #[error("[PROCESS_SPAWN] Failed to launch '{program}': {reason}")]
    Spawn { program: String, reason: String },
    /// The process ran longer than the configured timeout and was killed
    #[error("[PROCESS_TIMEOUT] '{program}' timed out after {}s", .limit.as_secs())]
    Timeout { program: String, limit: Duration },
    /// The process exited with a non-zero status
    #[error("[PROCESS_EXIT] '{program}' exited with status {code}: {stderr}")]
    NonZeroExit {
        program: String,
        code: i32,
        stderr: String,
    },
    /// The process was terminated by a signal and has no exit code
    #[error("[PROCESS_SIGNAL] '{program}' was terminated by a signal")]
    Signaled { program: String },
    /// Reading the process output failed
    #[error("[PROCESS_IO] I/O error while waiting for '{program}': {reason}")]
    Io { program: String, reason: String },
}

impl ProcessError {
    /// Short machine-friendly label, used as a metrics label and in reports
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessError::Spawn { .. } => "spawn",
            ProcessError::Timeout { .. } => "timeout",
            ProcessError::NonZeroExit { .. } => "non_zero_exit",
            ProcessError::Signaled { .. } => "signaled",
            ProcessError::Io { .. } => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = ProcessError::Timeout {
            program: "tesseract".to_string(),
            limit: Duration::from_secs(30),
        };
        assert_eq!(
            err.to_string(),
            "[PROCESS_TIMEOUT] 'tesseract' timed out after 30s"
        );
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_non_zero_exit_carries_stderr() {
        let err = ProcessError::NonZeroExit {
            program: "convert".to_string(),
            code: 1,
            stderr: "unable to open image".to_string(),
        };
        assert!(err.to_string().contains("unable to open image"));
        assert_eq!(err.kind(), "non_zero_exit");
    }
}

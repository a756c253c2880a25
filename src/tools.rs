//! # Tool Availability Checks
//!
//! Probes the external executables before a batch starts. A probe never
//! fails: launch errors, timeouts and non-zero exits all become
//! [`ToolStatus::Unavailable`].

use tracing::{info, warn};

use crate::process::{CommandRunner, Invocation};
use crate::tool_config::ToolConfig;

/// Result of probing an external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Available { version: Option<String> },
    Unavailable { reason: String },
}

impl ToolStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, ToolStatus::Available { .. })
    }
}

/// Probe the OCR engine with `<ocr_tool> -v`
pub async fn check_ocr_engine(runner: &dyn CommandRunner, tools: &ToolConfig) -> ToolStatus {
    let status = probe(runner, Invocation::new(&tools.ocr_tool).arg("-v")).await;
    match &status {
        ToolStatus::Available { version } => info!(
            tool = %tools.ocr_tool,
            version = version.as_deref().unwrap_or("unknown"),
            "OCR engine available"
        ),
        ToolStatus::Unavailable { reason } => warn!(
            tool = %tools.ocr_tool,
            reason = %reason,
            "OCR engine unavailable"
        ),
    }
    status
}

/// Probe the image processor with `<image_tool> -version`
pub async fn check_image_tool(runner: &dyn CommandRunner, tools: &ToolConfig) -> ToolStatus {
    let status = probe(runner, Invocation::new(&tools.image_tool).arg("-version")).await;
    if let ToolStatus::Unavailable { reason } = &status {
        warn!(
            tool = %tools.image_tool,
            reason = %reason,
            "Image tool probe failed, image stages will likely fail per file"
        );
    }
    status
}

async fn probe(runner: &dyn CommandRunner, invocation: Invocation) -> ToolStatus {
    match runner.run(&invocation).await {
        Ok(output) if output.success() => ToolStatus::Available {
            // tesseract prints its banner to stderr in some releases
            version: first_line(&output.stdout).or_else(|| first_line(&output.stderr)),
        },
        Ok(output) => ToolStatus::Unavailable {
            reason: match output.exit_code {
                Some(code) => format!("'{}' exited with status {}", invocation, code),
                None => format!("'{}' was terminated by a signal", invocation),
            },
        },
        Err(err) => ToolStatus::Unavailable {
            reason: err.to_string(),
        },
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

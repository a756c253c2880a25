//! # batch-ocr
//!
//! Batch image-to-text conversion. Finds images in a directory, removes
//! background noise with a threshold filter, converts the result to TIFF and
//! runs OCR on it, leaving `name_m.ext`, `name_m.tif` and `name_m.txt` next to
//! every original `name.ext`. The image work is done by ImageMagick and the
//! recognition by Tesseract, both launched as external processes.

pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod locator;
pub mod naming;
pub mod observability;
pub mod observability_config;
pub mod path_validation;
pub mod pipeline;
pub mod process;
pub mod process_errors;
pub mod report;
pub mod stages;
pub mod tool_config;
pub mod tools;

// Re-export types for easier access
pub use config::{AppConfig, PipelineConfig};
pub use pipeline::{GateError, Pipeline};
pub use process::{CommandRunner, Invocation, ProcessOutput, SystemRunner};
pub use report::BatchReport;

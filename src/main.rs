use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use batch_ocr::config::{self, AppConfig, PipelineConfig};
use batch_ocr::errors::{AppError, AppResult, EXIT_CONFIG_ERROR, EXIT_PARTIAL_FAILURE};
use batch_ocr::observability;
use batch_ocr::observability_config::ObservabilityConfig;
use batch_ocr::tool_config::{self, RecoveryConfig, ToolConfig};
use batch_ocr::{GateError, Pipeline, SystemRunner};
use clap::Parser;
use tracing::{error, info};

/// Convert every image in a directory to text with ImageMagick and Tesseract
#[derive(Parser, Debug)]
#[command(name = "batch-ocr", version, about)]
struct Args {
    /// Directory scanned (non-recursively) for input images
    #[arg(long, env = "BATCH_OCR_INPUT_DIR", default_value = config::DEFAULT_INPUT_DIR)]
    input_dir: PathBuf,

    /// Suffix of input files, including the dot
    #[arg(long, env = "BATCH_OCR_INPUT_EXT", default_value = config::DEFAULT_INPUT_EXT)]
    input_ext: String,

    /// Threshold filter strength in percent (0-100)
    #[arg(
        long,
        env = "BATCH_OCR_THRESHOLD",
        default_value_t = config::DEFAULT_THRESHOLD,
        value_parser = clap::value_parser!(u8).range(0..=i64::from(config::MAX_THRESHOLD))
    )]
    threshold: u8,

    /// Tesseract language(s), e.g. eng or eng+fra
    #[arg(long, env = "BATCH_OCR_LANG", default_value = config::DEFAULT_LANG)]
    lang: String,

    /// Convert to grayscale before thresholding
    #[arg(long, env = "BATCH_OCR_GRAYSCALE")]
    grayscale: bool,

    /// Re-scan the directory between phases and log differences
    #[arg(long, env = "BATCH_OCR_RESCAN")]
    rescan: bool,

    /// Image processor executable
    #[arg(long, env = "BATCH_OCR_IMAGE_TOOL", default_value = tool_config::DEFAULT_IMAGE_TOOL)]
    image_tool: String,

    /// OCR engine executable
    #[arg(long, env = "BATCH_OCR_OCR_TOOL", default_value = tool_config::DEFAULT_OCR_TOOL)]
    ocr_tool: String,

    /// Timeout for each external invocation, in seconds
    #[arg(long, env = "BATCH_OCR_TIMEOUT_SECS", default_value_t = tool_config::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Extra attempts for a failed invocation
    #[arg(long, env = "BATCH_OCR_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Write a JSON report to this path
    #[arg(long, env = "BATCH_OCR_REPORT")]
    report: Option<PathBuf>,

    /// Print the commands the batch would run and exit
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn into_config(self) -> (AppConfig, Option<PathBuf>, bool) {
        let config = AppConfig {
            pipeline: PipelineConfig {
                input_dir: self.input_dir,
                input_ext: self.input_ext,
                threshold: self.threshold,
                lang: self.lang,
                grayscale: self.grayscale,
                rescan: self.rescan,
            },
            tools: ToolConfig {
                image_tool: self.image_tool,
                ocr_tool: self.ocr_tool,
                recovery: RecoveryConfig {
                    max_retries: self.max_retries,
                    operation_timeout_secs: self.timeout_secs,
                    ..Default::default()
                },
            },
            observability: ObservabilityConfig::from_env(),
        };
        (config, self.report, self.dry_run)
    }
}

/// Exit code for a command line clap rejected, `None` for `--help` and `--version`
fn usage_exit_code(err: &clap::Error) -> Option<u8> {
    if err.use_stderr() {
        Some(EXIT_CONFIG_ERROR)
    } else {
        None
    }
}

fn main() -> ExitCode {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => match usage_exit_code(&e) {
            Some(code) => {
                let _ = e.print();
                return ExitCode::from(code);
            }
            None => e.exit(),
        },
    };
    let (config, report_path, dry_run) = args.into_config();

    if let Err(e) = observability::init_tracing_with_config(&config.observability) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let result = config
        .validate()
        .and_then(|()| run(config, report_path, dry_run));
    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, exit_code = e.exit_code(), "Batch did not complete");
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(config: AppConfig, report_path: Option<PathBuf>, dry_run: bool) -> AppResult<ExitCode> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to start the async runtime: {}", e)))?;

    let runner = Arc::new(SystemRunner::from_recovery(&config.tools.recovery));
    let pipeline = Pipeline::new(config.pipeline, config.tools, runner);

    if dry_run {
        let inputs = pipeline.discover_inputs();
        if inputs.is_empty() {
            return Err(GateError::NoInputFiles {
                dir: pipeline.config().input_dir.clone(),
                ext: pipeline.config().input_ext.clone(),
            }
            .into());
        }
        for planned in pipeline.plan(&inputs) {
            match planned {
                Ok(command) => println!("{}", command.invocation),
                Err(e) => println!("# skipped: {e}"),
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let report = runtime.block_on(pipeline.run())?;

    print!("{report}");
    if let Some(path) = report_path {
        report.write_json(&path)?;
        info!(path = %path.display(), "Report written");
    }

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL_FAILURE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("batch-ocr").chain(argv.iter().copied()))
    }

    #[test]
    fn test_defaults_parse() {
        let (config, report, dry_run) = parse(&[]).unwrap().into_config();
        assert_eq!(config.pipeline.threshold, 75);
        assert_eq!(config.pipeline.input_ext, ".jpg");
        assert!(report.is_none());
        assert!(!dry_run);
    }

    #[test]
    fn test_bad_flags_exit_with_config_code() {
        for argv in [
            &["--threshold", "101"][..],
            &["--threshold", "300"],
            &["--threshold", "-1"],
            &["--threshold", "abc"],
            &["--bogus"],
        ] {
            let err = parse(argv).unwrap_err();
            assert_eq!(usage_exit_code(&err), Some(EXIT_CONFIG_ERROR), "{:?}", argv);
        }
    }

    #[test]
    fn test_help_and_version_are_not_errors() {
        assert_eq!(usage_exit_code(&parse(&["--help"]).unwrap_err()), None);
        assert_eq!(usage_exit_code(&parse(&["--version"]).unwrap_err()), None);
    }

    #[test]
    fn test_threshold_bounds_accepted() {
        assert_eq!(parse(&["--threshold", "0"]).unwrap().threshold, 0);
        assert_eq!(parse(&["--threshold", "100"]).unwrap().threshold, 100);
    }
}

//! # Pipeline Tests Module
//!
//! End-to-end batches against a scripted runner: output layout, gates,
//! per-file failure accounting, circuit breaking and retries.


#[cfg(test)]
mod tests {
    use super::test_helpers::{
        create_images, list_names, test_pipeline, test_tools, RecordingRunner, Script,
    };
    use batch_ocr::config::PipelineConfig;
    use batch_ocr::tool_config::RecoveryConfig;
    use batch_ocr::{GateError, Pipeline};
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn names(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Two inputs go through all three stages and the originals survive
    #[tokio::test]
    async fn test_end_to_end_produces_all_outputs() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["a.jpg", "b.jpg"]);
        let runner = RecordingRunner::new(Script::default());
        let pipeline = test_pipeline(dir.path(), test_tools(), runner.clone());

        let report = pipeline.run().await.expect("gate passes");

        assert_eq!(
            list_names(dir.path()),
            vec![
                "a.jpg", "a_m.jpg", "a_m.tif", "a_m.txt", "b.jpg", "b_m.jpg", "b_m.tif",
                "b_m.txt"
            ]
        );
        assert_eq!(fs::read_to_string(dir.path().join("a.jpg")).unwrap(), "original a.jpg");
        assert_eq!(fs::read_to_string(dir.path().join("b.jpg")).unwrap(), "original b.jpg");

        assert!(report.is_clean());
        assert!(report.image_tool_available);
        assert_eq!(report.inputs, 2);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(
            report.outputs,
            vec![dir.path().join("a_m.txt"), dir.path().join("b_m.txt")]
        );
        assert_eq!(runner.stage_calls().len(), 6);
    }

    /// Commands are built exactly as the tools expect them
    #[tokio::test]
    async fn test_stage_commands_are_well_formed() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["photo.jpg"]);
        let runner = RecordingRunner::new(Script::default());
        let pipeline = test_pipeline(dir.path(), test_tools(), runner.clone());

        pipeline.run().await.unwrap();

        let path = |name: &str| dir.path().join(name).to_string_lossy().into_owned();
        let calls = runner.stage_calls();
        assert_eq!(calls[0].program(), "convert");
        assert_eq!(
            calls[0].args_lossy(),
            vec!["-threshold".to_string(), "75%".to_string(), path("photo.jpg"), path("photo_m.jpg")]
        );
        assert_eq!(calls[1].args_lossy(), vec![path("photo_m.jpg"), path("photo_m.tif")]);
        assert_eq!(calls[2].program(), "tesseract");
        assert_eq!(
            calls[2].args_lossy(),
            vec![path("photo_m.tif"), path("photo_m"), "-l".to_string(), "eng".to_string()]
        );
    }

    #[tokio::test]
    async fn test_gate_no_input_files() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["scan.png"]);
        let runner = RecordingRunner::new(Script::default());
        let pipeline = test_pipeline(dir.path(), test_tools(), runner.clone());

        let err = pipeline.run().await.unwrap_err();

        assert_eq!(
            err,
            GateError::NoInputFiles {
                dir: dir.path().to_path_buf(),
                ext: ".jpg".to_string(),
            }
        );
        assert!(runner.calls().is_empty());
        assert_eq!(list_names(dir.path()), vec!["scan.png"]);
    }

    #[tokio::test]
    async fn test_gate_missing_directory() {
        let dir = TempDir::new().unwrap();
        let runner = RecordingRunner::new(Script::default());
        let pipeline = test_pipeline(&dir.path().join("nope"), test_tools(), runner.clone());

        assert!(matches!(
            pipeline.run().await,
            Err(GateError::NoInputFiles { .. })
        ));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_gate_ocr_engine_unavailable() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["a.jpg", "b.jpg"]);
        let runner = RecordingRunner::new(Script {
            ocr_missing: true,
            ..Default::default()
        });
        let pipeline = test_pipeline(dir.path(), test_tools(), runner.clone());

        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, GateError::ToolUnavailable(_)));
        assert!(err.to_string().contains("No such file or directory"));
        assert!(runner.stage_calls().is_empty());
        assert_eq!(list_names(dir.path()), vec!["a.jpg", "b.jpg"]);
    }

    /// A failed filter drops the file from later phases and is reported
    #[tokio::test]
    async fn test_per_file_failure_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["a.jpg", "b.jpg", "c.jpg"]);
        let runner = RecordingRunner::new(Script {
            fail_on: names(&["b.jpg"]),
            ..Default::default()
        });
        let pipeline = test_pipeline(dir.path(), test_tools(), runner.clone());

        let report = pipeline.run().await.unwrap();

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_clean());
        let failure = &report.failures[0];
        assert_eq!(failure.stage, "filter");
        assert_eq!(failure.kind, "non_zero_exit");
        assert_eq!(failure.file, dir.path().join("b.jpg"));
        assert!(failure.reason.contains("unable to open image"));

        let files = list_names(dir.path());
        assert!(!files.contains(&"b_m.jpg".to_string()));
        assert!(!files.contains(&"b_m.txt".to_string()));
        assert!(files.contains(&"c_m.txt".to_string()));

        // 3 filter + 2 convert + 2 ocr
        assert_eq!(runner.stage_calls().len(), 7);
    }

    #[tokio::test]
    async fn test_zero_exit_without_output_is_a_failure() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["a.jpg"]);
        let runner = RecordingRunner::new(Script {
            no_output_for: names(&["a_m.tif"]),
            ..Default::default()
        });
        let pipeline = test_pipeline(dir.path(), test_tools(), runner);

        let report = pipeline.run().await.unwrap();

        assert_eq!(report.succeeded(), 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, "ocr");
        assert_eq!(report.failures[0].kind, "missing_output");
    }

    /// A tool that exits 0 without writing must not be credited with last run's file
    #[tokio::test]
    async fn test_stale_output_does_not_count_as_success() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["a.jpg", "a_m.txt"]);
        let runner = RecordingRunner::new(Script {
            no_output_for: names(&["a_m.tif"]),
            ..Default::default()
        });
        let pipeline = test_pipeline(dir.path(), test_tools(), runner);

        let report = pipeline.run().await.unwrap();

        assert_eq!(report.succeeded(), 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, "missing_output");
        assert!(!dir.path().join("a_m.txt").exists());
    }

    #[tokio::test]
    async fn test_failure_records_every_attempt() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["a.jpg", "b.jpg"]);
        let runner = RecordingRunner::new(Script {
            fail_on: names(&["b.jpg"]),
            ..Default::default()
        });
        let mut tools = test_tools();
        tools.recovery.max_retries = 2;
        let pipeline = test_pipeline(dir.path(), tools, runner.clone());

        let report = pipeline.run().await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].attempts, 3);
        // a: filter, convert, ocr; b: three filter attempts
        assert_eq!(runner.stage_calls().len(), 6);
    }

    #[tokio::test]
    async fn test_broken_image_tool_is_reported() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["a.jpg"]);
        let runner = RecordingRunner::new(Script {
            image_tool_broken: true,
            ..Default::default()
        });
        let pipeline = test_pipeline(dir.path(), test_tools(), runner);

        let report = pipeline.run().await.unwrap();

        assert!(!report.image_tool_available);
        assert!(report.to_string().contains("WARNING image tool"));
    }

    #[tokio::test]
    async fn test_circuit_breaker_skips_rest_of_stage() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        let runner = RecordingRunner::new(Script {
            fail_on: names(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]),
            ..Default::default()
        });
        let mut tools = test_tools();
        tools.recovery.circuit_breaker_threshold = 2;
        let pipeline = test_pipeline(dir.path(), tools, runner.clone());

        let report = pipeline.run().await.unwrap();

        assert_eq!(report.failed(), 2);
        assert_eq!(report.skipped_count(), 2);
        assert_eq!(report.skipped[0].file, dir.path().join("c.jpg"));
        assert_eq!(report.skipped[0].kind, "circuit_open");
        assert_eq!(runner.stage_calls().len(), 2);

        let filter = report.stages.iter().find(|s| s.stage == "filter").unwrap();
        assert_eq!((filter.attempted, filter.failed, filter.skipped), (2, 2, 2));
    }

    #[tokio::test]
    async fn test_retry_recovers_transient_failure() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["a.jpg"]);
        let runner = RecordingRunner::new(Script {
            fail_once: names(&["a_m.jpg"]),
            ..Default::default()
        });
        let mut tools = test_tools();
        tools.recovery = RecoveryConfig {
            max_retries: 1,
            ..tools.recovery
        };
        let pipeline = test_pipeline(dir.path(), tools, runner.clone());

        let report = pipeline.run().await.unwrap();

        assert!(report.is_clean());
        // filter, convert twice, ocr
        assert_eq!(runner.stage_calls().len(), 4);
    }

    #[tokio::test]
    async fn test_outputs_of_previous_run_are_not_inputs() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["a.jpg", "a_m.jpg", "old_y.jpg"]);
        let runner = RecordingRunner::new(Script::default());
        let pipeline = test_pipeline(dir.path(), test_tools(), runner.clone());

        let report = pipeline.run().await.unwrap();

        assert_eq!(report.inputs, 1);
        let filter_inputs: Vec<String> = runner
            .stage_calls()
            .iter()
            .filter(|c| c.args_lossy().first().map(String::as_str) == Some("-threshold"))
            .map(|c| c.args_lossy()[2].clone())
            .collect();
        assert_eq!(filter_inputs, vec![dir.path().join("a.jpg").to_string_lossy().into_owned()]);
    }

    #[tokio::test]
    async fn test_grayscale_stage_prefixes_outputs() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["page.png"]);
        let runner = RecordingRunner::new(Script::default());
        let config = PipelineConfig {
            input_dir: dir.path().to_path_buf(),
            input_ext: ".png".to_string(),
            grayscale: true,
            threshold: 60,
            lang: "eng+fra".to_string(),
            rescan: true,
        };
        let pipeline = Pipeline::new(config, test_tools(), runner.clone());

        let report = pipeline.run().await.unwrap();

        assert!(report.is_clean());
        assert_eq!(
            list_names(dir.path()),
            vec!["page.png", "page_y.png", "page_y_m.png", "page_y_m.tif", "page_y_m.txt"]
        );
        let calls = runner.stage_calls();
        assert_eq!(calls[0].args_lossy()[..2], ["-type", "Grayscale"]);
        assert_eq!(calls[1].args_lossy()[1], "60%");
        assert_eq!(calls[3].args_lossy()[3], "eng+fra");
    }

    #[tokio::test]
    async fn test_check_gate_returns_sorted_inputs() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["c.jpg", "a.jpg", "b.jpg"]);
        let runner = RecordingRunner::new(Script::default());
        let pipeline = test_pipeline(dir.path(), test_tools(), runner.clone());

        let batch = pipeline.check_gate().await.unwrap();
        let names: Vec<&str> = batch.iter().map(|f| f.file_name()).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "c.jpg"]);
        // Only the OCR probe ran
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_dry_run_plan_for_directory() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["a.jpg", "b.jpg"]);
        let runner = RecordingRunner::new(Script::default());
        let pipeline = test_pipeline(dir.path(), test_tools(), runner.clone());

        let plan = pipeline.plan(&pipeline.discover_inputs());

        assert_eq!(plan.len(), 6);
        assert!(plan.iter().all(|c| c.is_ok()));
        assert!(runner.calls().is_empty());
        assert_eq!(list_names(dir.path()), vec!["a.jpg", "b.jpg"]);
    }
}

//! CLI integration tests for the `ocrkit` binary.
//!
//! Each test spawns the compiled binary with `OCRKIT_CONFIG` pointing at a
//! nonexistent path so the config loader falls back to defaults.

use std::path::Path;
use std::process::{Command, Output};

fn ocrkit_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ocrkit"));
    cmd.env("OCRKIT_CONFIG", "/tmp/.ocrkit-test-nonexistent-config.json");
    cmd.env("RUST_LOG", "off");
    cmd
}

fn run(args: &[&str]) -> Output {
    ocrkit_bin().args(args).output().expect("failed to run ocrkit")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn generate(dir: &Path, count: usize, seed: u64) {
    let output = run(&[
        "generate",
        "--count",
        &count.to_string(),
        "--seed",
        &seed.to_string(),
        "--output",
        dir.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "generate failed: {}", stderr(&output));
}

// ── 1. Version and help ─────────────────────────────────────────────────

#[test]
fn version_output() {
    let output = run(&["--version"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("ocrkit") && out.contains("0.1.0"), "got: {out}");
}

#[test]
fn help_lists_subcommands() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let out = stdout(&output);
    for sub in ["init", "train", "evaluate", "api", "create-handler", "handlers", "generate"] {
        assert!(out.contains(sub), "help should mention '{sub}', got: {out}");
    }
}

// ── 2. Registry listing ─────────────────────────────────────────────────

#[test]
fn handlers_lists_bundled_families() {
    let output = run(&["handlers"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    for id in ["demo_preprocess", "demo_train", "demo_evaluate", "demo_ocr", "linear_train"] {
        assert!(out.contains(id), "missing {id} in: {out}");
    }
    for alias in ["DemoPreprocessHandler", "DemoTrainHandler", "DemoEvaluateHandler", "DemoOCRHandler"] {
        assert!(out.contains(alias), "missing {alias} in: {out}");
    }
}

#[test]
fn handlers_filter_by_kind() {
    let output = run(&["handlers", "--kind", "ocr"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("demo_ocr"));
    assert!(!out.contains("demo_train"));
}

// ── 3. Generate ─────────────────────────────────────────────────────────

#[test]
fn generate_writes_count_images() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    generate(&data, 10, 3);
    let pngs = std::fs::read_dir(&data)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|x| x == "png"))
        .count();
    assert_eq!(pngs, 10);
}

#[test]
fn generate_single_text() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&["generate", "--text", "wxyz", "--output", dir.path().to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(dir.path().join("wxyz.png").is_file());

    let bad = run(&["generate", "--text", "ab1", "--output", dir.path().to_str().unwrap()]);
    assert!(!bad.status.success());
}

// ── 4. Train and evaluate ───────────────────────────────────────────────

#[test]
fn train_then_evaluate_demo() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let model = dir.path().join("model.json");
    let report = dir.path().join("report.json");
    generate(&data, 12, 7);

    let output = run(&[
        "train",
        "--input",
        data.to_str().unwrap(),
        "--output",
        model.to_str().unwrap(),
        "--epochs",
        "2",
    ]);
    assert!(output.status.success(), "train failed: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Training complete"), "got: {out}");
    assert!(out.contains("epoch 2/2"), "got: {out}");
    assert!(model.is_file());

    let output = run(&[
        "evaluate",
        "--target",
        data.to_str().unwrap(),
        "--model",
        model.to_str().unwrap(),
        "--report",
        report.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "evaluate failed: {}", stderr(&output));
    // The report is program output; stderr only carries logs and errors.
    assert!(stdout(&output).contains("Accuracy"));
    assert!(!stderr(&output).contains("Accuracy"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["total_samples"], 12);
    let accuracy = json["accuracy"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&accuracy));
}

#[test]
fn train_and_evaluate_by_class_name() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let model = dir.path().join("model.json");
    generate(&data, 6, 11);

    let output = run(&[
        "train",
        "--input",
        data.to_str().unwrap(),
        "--output",
        model.to_str().unwrap(),
        "--handler",
        "DemoTrainHandler",
        "--epochs",
        "1",
    ]);
    assert!(output.status.success(), "train failed: {}", stderr(&output));
    assert!(stdout(&output).contains("demo_train"));
    assert!(model.is_file());

    let output = run(&[
        "evaluate",
        "--target",
        data.to_str().unwrap(),
        "--model",
        model.to_str().unwrap(),
        "--handler",
        "DemoEvaluateHandler",
    ]);
    assert!(output.status.success(), "evaluate failed: {}", stderr(&output));
}

#[test]
fn evaluate_missing_model_reports_code() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    generate(&data, 2, 1);
    let output = run(&[
        "evaluate",
        "--target",
        data.to_str().unwrap(),
        "--model",
        dir.path().join("absent.json").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("error[MODEL_LOAD_ERROR]"),
        "got: {}",
        stderr(&output)
    );
}

#[test]
fn unknown_handler_fails_with_code() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    generate(&data, 2, 1);
    let output = run(&[
        "train",
        "--input",
        data.to_str().unwrap(),
        "--handler",
        "transformer_train",
        "--output",
        dir.path().join("m.json").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("error[HANDLER_NOT_FOUND]"),
        "got: {}",
        stderr(&output)
    );
}

#[test]
fn explicit_missing_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&[
        "--config",
        "/tmp/.ocrkit-definitely-missing.json",
        "train",
        "--input",
        dir.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("error[CONFIG_ERROR]"), "got: {}", stderr(&output));
}

// ── 5. Scaffolding ──────────────────────────────────────────────────────

#[test]
fn init_writes_files_and_refuses_rerun() {
    let dir = tempfile::tempdir().unwrap();
    let handlers = dir.path().join("handlers");
    let scripts = dir.path().join("scripts");
    let args = [
        "init",
        "--output-dir",
        handlers.to_str().unwrap(),
        "--scripts-dir",
        scripts.to_str().unwrap(),
    ];

    let output = run(&args);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(handlers.join("demo.rs").is_file());
    assert!(scripts.join("train_linear.sh").is_file());

    let output = run(&args);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--force"));

    let mut forced = args.to_vec();
    forced.push("--force");
    assert!(run(&forced).status.success());
}

#[test]
fn create_handler_scaffolds_family() {
    let dir = tempfile::tempdir().unwrap();
    let handlers = dir.path().join("handlers");
    let output = run(&[
        "create-handler",
        "cnn",
        "--kinds",
        "preprocess,train",
        "--output-dir",
        handlers.to_str().unwrap(),
        "--scripts-dir",
        dir.path().join("scripts").to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let src = std::fs::read_to_string(handlers.join("cnn_handler.rs")).unwrap();
    assert!(src.contains("CnnPreprocess"));
    assert!(src.contains("CnnTrain"));
    assert!(!src.contains("CnnOcr"));
    assert!(dir.path().join("scripts/train_cnn.sh").is_file());
}

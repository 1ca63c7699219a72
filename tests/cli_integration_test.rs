use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

mod common;
use common::test_helpers::TestFixtures;

/// Run the binary from an empty directory so no stray config file is picked up.
fn run(args: &[&str]) -> Output {
    let workdir = TempDir::new().unwrap();
    Command::new(env!("CARGO_BIN_EXE_catalog-import"))
        .args(args)
        .current_dir(workdir.path())
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("not JSON ({}): {}", e, stdout))
}

#[test]
fn test_cli_help_output() {
    let output = run(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("formats"));
    assert!(stdout.contains("detect"));
    assert!(stdout.contains("validate"));
    assert!(stdout.contains("import"));
    assert!(stdout.contains("--output"));
}

#[test]
fn test_cli_formats_json() {
    let output = run(&["formats", "--output", "json"]);

    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value[0]["id"], "bmecat");
    assert_eq!(value[0]["extensions"][0], ".xml");
    assert_eq!(value[1]["name"], "Datanorm");
}

#[test]
fn test_cli_detect() {
    let fixtures = TestFixtures::new();
    let file = path_arg(&fixtures.bmecat("catalog_2005_2.xml"));

    let output = run(&["detect", &file, "--output", "json"]);
    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["detected"]["format_id"], "bmecat");
    assert_eq!(value["scores"].as_array().unwrap().len(), 2);
}

#[test]
fn test_cli_detect_unknown_exits_with_two() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("notes.md");
    std::fs::write(&file, "nothing to see here").unwrap();

    let output = run(&["detect", &path_arg(&file)]);
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("matches no known format"));
}

#[test]
fn test_cli_validate_invalid_file() {
    let fixtures = TestFixtures::new();
    let file = path_arg(&fixtures.datanorm("no_header.txt"));

    let output = run(&["validate", &file, "--output", "json"]);
    assert_eq!(output.status.code(), Some(1));
    let value = stdout_json(&output);
    assert_eq!(value["format"], "datanorm");
    assert_eq!(value["valid"], false);
    assert_eq!(value["errors"][0]["code"], "DATANORM_MISSING_HEADER");
}

#[test]
fn test_cli_validate_human_output() {
    let fixtures = TestFixtures::new();
    let file = path_arg(&fixtures.datanorm("complete.txt"));

    let output = run(&["validate", &file]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("✓ VALID"));
}

#[test]
fn test_cli_import_json() {
    let fixtures = TestFixtures::new();
    let file = path_arg(&fixtures.bmecat("catalog_1_2.xml"));

    let output = run(&[
        "import",
        &file,
        "--tenant",
        "acme",
        "--supplier",
        "LEGACY",
        "--output",
        "json",
    ]);
    assert!(output.status.success());

    let value = stdout_json(&output);
    let outcome = &value["outcome"];
    assert_eq!(outcome["format_id"], "bmecat");
    assert_eq!(outcome["parse"]["entities"][0]["external_id"], "LT-1");
    assert_eq!(outcome["parse"]["entities"][0]["supplier_id"], "LEGACY");
    assert_eq!(outcome["parse"]["statistics"]["total_items"], 1);
}

#[test]
fn test_cli_import_with_unknown_format_fails() {
    let fixtures = TestFixtures::new();
    let file = path_arg(&fixtures.datanorm("complete.txt"));

    let output = run(&["import", &file, "--tenant", "acme", "--format", "csv"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Unsupported format: csv"));
}

#[test]
fn test_cli_missing_file() {
    let output = run(&["validate", "/nonexistent/catalog.xml"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Failed to read"));
}

#[test]
fn test_cli_conflicting_options() {
    let output = run(&["--verbose", "--quiet", "formats"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("cannot be used with"));
}

#[test]
fn test_cli_explicit_config_file() {
    let fixtures = TestFixtures::new();
    let config = path_arg(&fixtures.strict_config());
    let file = path_arg(&fixtures.datanorm("complete.txt"));

    let output = run(&["--config", &config, "detect", &file, "--output", "json"]);
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["detected"]["format_id"], "datanorm");
}

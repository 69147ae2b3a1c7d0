/*
[INPUT]:  Temporary YAML config files
[OUTPUT]: Verification of config loading and validation errors
[POS]:    Integration tests - sandbox configuration
[UPDATE]: When config schema changes
*/

use std::io::Write;

use async_command_sandbox::{DemoKind, SandboxConfig};
use tempfile::NamedTempFile;
use tokio_test::assert_ok;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
title: Debug
cancel_after_ms: 250
demos:
  - kind: progress
    title: Increase Progress
    steps: 10
    step_delay_ms: 5
  - kind: long_running
    title: Test Command
    reset_title_on_complete: false
"#,
    );

    let config = assert_ok!(SandboxConfig::from_file(file.path().to_str().unwrap()));
    assert_eq!(config.title, "Debug");
    assert_eq!(config.cancel_after_ms, 250);
    assert_eq!(config.demos.len(), 2);
    assert_eq!(config.demos[0].kind, DemoKind::Progress);
    assert_eq!(config.demos[0].steps, 10);
    assert_eq!(config.demos[1].kind, DemoKind::LongRunning);
    assert_eq!(config.demos[1].step_delay_ms, 100);
    assert!(!config.demos[1].reset_title_on_complete);
}

#[test]
fn test_empty_file_uses_defaults() {
    let file = write_config("{}\n");
    let config = assert_ok!(SandboxConfig::from_file(file.path().to_str().unwrap()));
    assert_eq!(config.demos.len(), SandboxConfig::default().demos.len());
}

#[test]
fn test_unknown_kind_rejected() {
    let file = write_config(
        r#"
demos:
  - kind: teleport
    title: Nope
"#,
    );
    let err = SandboxConfig::from_file(file.path().to_str().unwrap()).unwrap_err();
    assert!(format!("{err:#}").contains("parse sandbox config"));
}

#[test]
fn test_blank_title_rejected() {
    let file = write_config(
        r#"
demos:
  - kind: failing
    title: "  "
"#,
    );
    let err = SandboxConfig::from_file(file.path().to_str().unwrap()).unwrap_err();
    assert!(format!("{err:#}").contains("title must not be empty"));
}

#[test]
fn test_missing_file_reports_path() {
    let err = SandboxConfig::from_file("/definitely/not/here.yaml").unwrap_err();
    assert!(format!("{err:#}").contains("/definitely/not/here.yaml"));
}

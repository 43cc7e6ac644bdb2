//! Behavior files through the CLI surface: the shipped sample validates and
//! runs, broken files are reported rather than executed, and subcommand
//! exit codes follow the documented convention.

use std::path::{Path, PathBuf};

use serde_json::json;

use skillflow_cli::assemble::assemble;
use skillflow_cli::config::BehaviorFile;
use skillflow_cli::outline::{run_outline, OutlineArgs};
use skillflow_cli::run::{run_run, RunArgs};
use skillflow_cli::validate::{run_validate, ValidateArgs};
use skillflow_core::{ConstructionDefect, KeyName};
use skillflow_machine::Userdata;

fn sample() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../behaviors/serve_drinks.yaml")
}

fn write_behavior(dir: &tempfile::TempDir, yaml: &str) -> PathBuf {
    let path = dir.path().join("behavior.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

// ── Shipped sample ───────────────────────────────────────────────────

#[test]
fn sample_behavior_validates_and_outlines() {
    assert_eq!(run_validate(&ValidateArgs { path: sample() }).unwrap(), 0);
    assert_eq!(
        run_outline(&OutlineArgs {
            path: sample(),
            json: false
        })
        .unwrap(),
        0
    );
}

#[test]
fn sample_behavior_serves_the_guest() {
    let file = BehaviorFile::load(&sample()).unwrap();
    let mut assembly = assemble(&file).unwrap();

    let mut userdata = Userdata::new();
    for (key, value) in &file.userdata {
        userdata.insert(KeyName::new(key.as_str()).unwrap(), value.clone());
    }
    assert_eq!(assembly.machine.run(&mut userdata).unwrap(), "served");
    assert_eq!(userdata.get("drink"), Some(&json!("cola")));
    // The nested machine's private key stays inside it.
    assert!(!userdata.contains_key("item"));

    let path: Vec<String> = assembly
        .machine
        .history()
        .iter()
        .map(|r| r.from.to_string())
        .collect();
    assert_eq!(path, ["TAKE_ORDER", "FETCH", "HAND_OVER"]);

    // Blocked once, then arrived.
    assert_eq!(assembly.capabilities["navigation"].invocations().len(), 2);
    assert_eq!(assembly.capabilities["arm"].invocations().len(), 1);
}

#[test]
fn sample_behavior_runs_from_the_cli() {
    let args = RunArgs {
        path: sample(),
        json: true,
        preempt_after_ms: None,
    };
    assert_eq!(run_run(&args).unwrap(), 0);
}

// ── Broken files ─────────────────────────────────────────────────────

const MISWIRED: &str = r#"
machine:
  name: MISWIRED
  outcomes: [done]
  states:
    - name: GREET
      fixed: { outcome: greeted }
      transitions: { greeted: LEAVE }
    - name: USE
      scripted: { outcomes: [ok], script: [ok], reads: [drink] }
      transitions: { ok: done }
"#;

#[test]
fn validate_reports_defects_with_exit_code_1() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_behavior(&dir, MISWIRED);
    assert_eq!(run_validate(&ValidateArgs { path: path.clone() }).unwrap(), 1);

    let err = assemble(&BehaviorFile::load(&path).unwrap()).err().unwrap();
    assert_eq!(err.machine, "MISWIRED");
    assert!(err.has(|d| matches!(d, ConstructionDefect::UnknownTarget { target, .. } if target == "LEAVE")));
    assert!(err.has(|d| matches!(d, ConstructionDefect::UnsatisfiedInputKey { key, .. } if key == "drink")));
    assert!(err.has(|d| matches!(d, ConstructionDefect::UnreachableOutcome { .. })));
}

#[test]
fn miswired_behavior_is_never_run() {
    let dir = tempfile::tempdir().unwrap();
    let args = RunArgs {
        path: write_behavior(&dir, MISWIRED),
        json: false,
        preempt_after_ms: None,
    };
    let err = run_run(&args).unwrap_err();
    assert!(format!("{err:#}").contains("failed to assemble"));
}

#[test]
fn malformed_yaml_is_an_error_not_a_defect() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_behavior(&dir, "machine: [not, a, machine]\n");
    let err = run_validate(&ValidateArgs { path }).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse"));
}

// ── Preemption ───────────────────────────────────────────────────────

#[test]
fn preempted_run_with_declared_outcome_exits_0() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_behavior(
        &dir,
        r#"
machine:
  name: PATROL
  outcomes: [done, preempted]
  states:
    - name: WAIT
      wait: { seconds: 30, poll_interval_ms: 5 }
      transitions: { waited: done, preempted: preempted }
"#,
    );
    let args = RunArgs {
        path,
        json: false,
        preempt_after_ms: Some(20),
    };
    assert_eq!(run_run(&args).unwrap(), 0);
}

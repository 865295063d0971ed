use assert_cmd::assert::OutputAssertExt;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const SPEC_WITH_DANGLING_REF: &str = r#"
id: SPEC-SYS-002
title: Session timeout
description: Sessions expire after inactivity
related_requirements: [REQ-SYS-999]
implementation_unit: src/session.py
unit_test: tests/test_session.py
"#;

/// Command with an isolated registry and no ANSI colours
fn cdlreq(registry_dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cdlreq"));
    cmd.env("CDLREQ_REGISTRY_PATH", registry_dir.join("registry.yaml"))
        .env("NO_COLOR", "1")
        .env_remove("CDLREQ_PROJECT")
        .env_remove("RUST_LOG");
    cmd
}

fn init_project(temp: &TempDir) -> std::path::PathBuf {
    let root = temp.path().join("project");
    cdlreq(temp.path())
        .args(["init", "-d"])
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("requirements/authentication.yaml"));
    root
}

#[test]
fn init_then_validate_passes() {
    let temp = TempDir::new().expect("tempdir");
    let root = init_project(&temp);

    assert!(root.join("requirements/specifications/authentication.yaml").is_file());

    cdlreq(temp.path())
        .args(["validate", "-d"])
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("All records are valid"));
}

#[test]
fn validate_reports_defects_as_json_and_fails() {
    let temp = TempDir::new().expect("tempdir");
    let root = init_project(&temp);
    fs::write(
        root.join("requirements/specifications/session.yaml"),
        SPEC_WITH_DANGLING_REF,
    )
    .expect("write spec");

    let output = cdlreq(temp.path())
        .args(["validate", "--format", "json", "-d"])
        .arg(&root)
        .output()
        .expect("run cdlreq");

    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(json["valid"], false);
    assert_eq!(json["specifications"], 2);
    let defects = json["defects"].as_array().expect("defects array");
    assert_eq!(defects.len(), 1);
    assert_eq!(defects[0]["kind"], "dangling_reference");
    assert_eq!(defects[0]["subject"], "SPEC-SYS-002");
}

#[test]
fn validate_requirements_only_ignores_specification_defects() {
    let temp = TempDir::new().expect("tempdir");
    let root = init_project(&temp);
    fs::write(
        root.join("requirements/specifications/session.yaml"),
        SPEC_WITH_DANGLING_REF,
    )
    .expect("write spec");

    cdlreq(temp.path())
        .args(["validate", "--requirements-only", "-d"])
        .arg(&root)
        .assert()
        .success();
}

#[test]
fn validate_missing_root_is_fatal() {
    let temp = TempDir::new().expect("tempdir");

    cdlreq(temp.path())
        .args(["validate", "-d"])
        .arg(temp.path().join("does-not-exist"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Project root does not exist"));
}

#[test]
fn coverage_gates_on_executed_tests() {
    let temp = TempDir::new().expect("tempdir");
    let root = init_project(&temp);
    fs::create_dir_all(root.join("tests")).expect("tests dir");
    fs::write(
        root.join("tests/test_authentication.py"),
        "def test_login():\n    pass\n\ndef test_lockout():\n    pass\n",
    )
    .expect("write test file");

    let partial = temp.path().join("partial.txt");
    fs::write(&partial, "tests/test_authentication.py::test_login\n").expect("write list");

    let output = cdlreq(temp.path())
        .args(["coverage", "--format", "json", "-d"])
        .arg(&root)
        .arg(&partial)
        .output()
        .expect("run cdlreq");
    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    let entry = &json["specifications"][0];
    assert_eq!(entry["verdict"], "partially_covered");
    assert_eq!(entry["unmatched"][0], "test_lockout");

    let full = temp.path().join("full.txt");
    fs::write(
        &full,
        "# pytest --collect-only\ntests/test_authentication.py::test_login\ntests/test_authentication.py::test_lockout\n",
    )
    .expect("write list");

    cdlreq(temp.path())
        .args(["coverage", "-d"])
        .arg(&root)
        .arg(&full)
        .assert()
        .success()
        .stdout(predicate::str::contains("Coverage: 100.0%"));

    cdlreq(temp.path())
        .args(["coverage", "--fail-under", "0", "-d"])
        .arg(&root)
        .arg(&partial)
        .assert()
        .success();
}

#[test]
fn trace_writes_yaml_matrix() {
    let temp = TempDir::new().expect("tempdir");
    let root = init_project(&temp);
    let out = temp.path().join("reports/trace.yaml");

    cdlreq(temp.path())
        .args(["trace", "-d"])
        .arg(&root)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let content = fs::read_to_string(&out).expect("read matrix");
    assert!(content.contains("requirement: REQ-SYS-001"));
    assert!(content.contains("SPEC-SYS-001"));
}

#[test]
fn list_filters_by_type() {
    let temp = TempDir::new().expect("tempdir");
    let root = init_project(&temp);

    let output = cdlreq(temp.path())
        .args(["list", "-t", "specifications", "--format", "json", "-d"])
        .arg(&root)
        .output()
        .expect("run cdlreq");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    let records = json.as_array().expect("records array");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["kind"], "specification");
    assert_eq!(records[0]["id"], "SPEC-SYS-001");
}

#[test]
fn registered_projects_are_audited() {
    let temp = TempDir::new().expect("tempdir");
    let root = init_project(&temp);

    cdlreq(temp.path())
        .args(["db", "register", "--name", "auth", "--default", "--path"])
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Project 'auth' registered successfully."));

    cdlreq(temp.path())
        .args(["db", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("auth"));

    let output = cdlreq(temp.path())
        .args(["audit", "--format", "json"])
        .output()
        .expect("run cdlreq");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(json[0]["project"], "auth");
    assert_eq!(json[0]["summary"]["requirements"], 1);

    cdlreq(temp.path())
        .args(["audit", "--name", "unknown"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found in registry"));
}

#[test]
fn create_writes_records_that_validate_and_never_overwrites() {
    let temp = TempDir::new().expect("tempdir");
    let root = init_project(&temp);

    cdlreq(temp.path())
        .args([
            "create",
            "requirement",
            "--id",
            "SYS-002",
            "--title",
            "System shall log access",
            "--req-type",
            "security",
            "--criterion",
            "Every login is recorded",
            "-d",
        ])
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created requirement REQ-SYS-002"));
    let written = root.join("requirements/req_sys_002.yaml");
    assert!(fs::read_to_string(&written)
        .expect("read requirement")
        .contains("type: security"));

    cdlreq(temp.path())
        .args([
            "create",
            "specification",
            "--id",
            "SYS-002",
            "--title",
            "Access log writer",
            "--requirement",
            "SYS-002",
            "--implementation-unit",
            "src/access_log.py",
            "--unit-test",
            "tests/test_access_log.py",
            "-o",
            "requirements/specifications/access_log.yaml",
            "-d",
        ])
        .arg(&root)
        .assert()
        .success();
    assert!(root.join("requirements/specifications/access_log.yaml").is_file());

    cdlreq(temp.path())
        .args(["validate", "-d"])
        .arg(&root)
        .assert()
        .success();

    fs::write(&written, "# edited by hand\n").expect("edit requirement");
    cdlreq(temp.path())
        .args([
            "create",
            "requirement",
            "--id",
            "REQ-SYS-002",
            "--title",
            "Replacement",
            "--criterion",
            "Something else entirely",
            "-d",
        ])
        .arg(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Refusing to overwrite"));
    assert_eq!(
        fs::read_to_string(&written).expect("read requirement"),
        "# edited by hand\n"
    );
}

#[test]
fn create_specification_requires_trace_fields() {
    let temp = TempDir::new().expect("tempdir");
    let root = init_project(&temp);

    cdlreq(temp.path())
        .args(["create", "specification", "--id", "SYS-003", "--title", "Orphan", "-d"])
        .arg(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--requirement"));
}

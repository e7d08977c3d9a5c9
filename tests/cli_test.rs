//! End-to-end tests for the debugweave binary.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

/// The binary, run from an empty directory so no config is discovered.
fn debugweave(cwd: &TempDir) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("debugweave");
    cmd.current_dir(cwd.path()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_instrument_file_to_stdout() {
    let tmp = TempDir::new().unwrap();
    debugweave(&tmp)
        .arg("instrument")
        .arg(testdata_path().join("add.c"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("int add(int a, int b) {\n    int c = a + b;\n"))
        .stdout(predicate::str::contains("printf(\"Extra Debug Info: entered function add\\n\");"))
        .stderr(predicate::str::contains("1 function instrumented"));
}

#[test]
fn test_weave_alias_and_json_report() {
    let tmp = TempDir::new().unwrap();
    let output = debugweave(&tmp)
        .arg("weave")
        .arg(testdata_path().join("add.c"))
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(report["functions_instrumented"], 1);
    assert_eq!(report["files"][0]["functions"][0]["name"], "add");
    assert_eq!(report["files"][0]["functions"][0]["status"], "instrumented");
}

#[test]
fn test_kernel_config_and_overrides() {
    let tmp = TempDir::new().unwrap();
    debugweave(&tmp)
        .arg("instrument")
        .arg(testdata_path().join("driver.c"))
        .arg("--config")
        .arg(testdata_path().join("kernel.yaml"))
        .args(["--backend", "dev_dbg", "--device", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "dev_dbg(dev, \"Extra Debug Info: entered function demo_probe\\n\");",
        ))
        .stdout(predicate::str::contains("#include <linux/kthread.h>"));
}

#[test]
fn test_directory_requires_output_mode() {
    let tmp = TempDir::new().unwrap();
    debugweave(&tmp)
        .arg("instrument")
        .arg(testdata_path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--in-place or --output"));
}

#[test]
fn test_output_directory() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(src.join("lib")).unwrap();
    fs::copy(testdata_path().join("add.c"), src.join("lib/add.c")).unwrap();
    fs::write(src.join("README"), "not code\n").unwrap();

    debugweave(&tmp)
        .args(["instrument", "src", "--output", "out", "--disable", "calls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 file, 1 changed"));

    let written = fs::read_to_string(tmp.path().join("out/lib/add.c")).unwrap();
    assert!(written.contains("exiting function add"));
    assert!(!tmp.path().join("out/README").exists());
}

#[test]
fn test_in_place_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("add.c");
    fs::copy(testdata_path().join("add.c"), &file).unwrap();

    debugweave(&tmp).args(["instrument", "add.c", "-i"]).assert().success();
    let once = fs::read_to_string(&file).unwrap();
    assert!(once.contains("#EXTRA_DEBUG_PRINTS add"));

    debugweave(&tmp)
        .args(["instrument", "add.c", "-i"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 changed"));
    assert_eq!(fs::read_to_string(&file).unwrap(), once);
}

#[test]
fn test_invalid_format_and_backend() {
    let tmp = TempDir::new().unwrap();
    let add = testdata_path().join("add.c");
    debugweave(&tmp)
        .arg("instrument")
        .arg(&add)
        .args(["--format", "xml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid format"));

    debugweave(&tmp)
        .arg("instrument")
        .arg(&add)
        .args(["--backend", "syslog"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_path() {
    let tmp = TempDir::new().unwrap();
    debugweave(&tmp)
        .args(["instrument", "nope.c"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot access path"));
}

#[test]
fn test_init_list_and_create() {
    let tmp = TempDir::new().unwrap();
    debugweave(&tmp)
        .args(["init", "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kernel-driver"))
        .stdout(predicate::str::contains("userspace (default)"));

    debugweave(&tmp)
        .args(["init", "--template", "minimal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created debugweave.yaml"));
    assert!(tmp.path().join("debugweave.yaml").exists());

    // Existing file is never overwritten
    debugweave(&tmp).args(["init"]).assert().code(2);

    // The discovered config applies: minimal has no parameter logs
    fs::copy(testdata_path().join("add.c"), tmp.path().join("add.c")).unwrap();
    debugweave(&tmp)
        .args(["instrument", "add.c"])
        .assert()
        .success()
        .stdout(predicate::str::contains("entered function add"))
        .stdout(predicate::str::contains("a=%d").not());
}

#[test]
fn test_unknown_template() {
    let tmp = TempDir::new().unwrap();
    debugweave(&tmp)
        .args(["init", "--template", "rtos"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown template"));
}

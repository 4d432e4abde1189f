//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn cli_without_arguments_prints_help() {
    let mut cmd = cargo_bin_cmd!("benchferry");
    cmd.assert().failure().stderr(contains("Usage"));
}

#[test]
fn cli_help_lists_benchmark_flags() {
    let mut cmd = cargo_bin_cmd!("benchferry");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(contains("--key-file"))
        .stdout(contains("--resource-class"))
        .stdout(contains("--max-run-duration"));
}

#[test]
fn cli_rejects_missing_placement_flags() {
    let mut cmd = cargo_bin_cmd!("benchferry");
    cmd.args(["--key-file", "bench.pem"]);
    cmd.assert()
        .failure()
        .code(2)
        .stderr(contains("--subnet-id"));
}

#[test]
fn cli_reports_missing_public_key() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let key = dir.path().join("absent.pem");
    let mut cmd = cargo_bin_cmd!("benchferry");
    cmd.env("RUST_LOG", "off");
    cmd.arg("--key-file")
        .arg(&key)
        .args(["--subnet-id", "pn-1", "--security-group-id", "sg-1"]);

    cmd.assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(contains("absent.pem.pub"));
}

#[test]
fn cli_rejects_zero_batch_size() {
    let mut cmd = cargo_bin_cmd!("benchferry");
    cmd.args([
        "--key-file",
        "bench.pem",
        "--subnet-id",
        "pn-1",
        "--security-group-id",
        "sg-1",
        "--batch-size",
        "0",
    ]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("batch size"));
}

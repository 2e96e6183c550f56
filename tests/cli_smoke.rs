//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

fn ydemo() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ydemo");
    cmd.env_remove("YD_KEY")
        .env_remove("YD_SECRET")
        .env_remove("YD_URL")
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn cli_without_arguments_prints_usage() {
    ydemo().assert().failure().stderr(contains("Usage"));
}

#[test]
fn cli_help_lists_every_demo() {
    ydemo()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("image-montage"))
        .stdout(contains("slurm-cluster"));
}

#[test]
fn cli_reports_missing_key_with_its_variable() {
    ydemo()
        .args(["image-montage", "--secret", "s"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("YD_KEY"));
}

#[test]
fn cli_rejects_unusable_platform_url_before_any_request() {
    ydemo()
        .args([
            "slurm-cluster",
            "--key",
            "k",
            "--secret",
            "s",
            "--url",
            "not a url",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("platform client error"));
}

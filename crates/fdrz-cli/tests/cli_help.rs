use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("fdrz")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("logout"))
        .stdout(predicate::str::contains("workflows"))
        .stdout(predicate::str::contains("users"));
}

#[test]
fn test_workflows_help_shows_subcommands() {
    cargo_bin_cmd!("fdrz")
        .args(["workflows", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("delete"));
}

#[test]
fn test_login_help_shows_options() {
    cargo_bin_cmd!("fdrz")
        .args(["login", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--silent"))
        .stdout(predicate::str::contains("--username"));
}

#[test]
fn test_password_requires_username() {
    cargo_bin_cmd!("fdrz")
        .args(["login", "--password", "hunter2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--username"));
}

#[test]
fn test_unknown_workflow_status_is_rejected() {
    cargo_bin_cmd!("fdrz")
        .args(["workflows", "create", "--name", "x", "--status", "archived"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("archived"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("fdrz")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1"));
}

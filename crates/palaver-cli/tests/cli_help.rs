use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("palaver")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("sessions"))
        .stdout(predicate::str::contains("models"))
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_sessions_help_shows_subcommands() {
    cargo_bin_cmd!("palaver")
        .args(["sessions", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("rename"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("clear"));
}

#[test]
fn test_chat_help_shows_options() {
    cargo_bin_cmd!("palaver")
        .args(["chat", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--model"))
        .stdout(predicate::str::contains("--session"))
        .stdout(predicate::str::contains("--chain-of-thought"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("palaver")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.3"));
}

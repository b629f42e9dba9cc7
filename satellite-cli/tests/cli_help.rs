use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_every_subcommand() {
    Command::cargo_bin("satellite")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("archives"))
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("metadata"))
        .stdout(predicate::str::contains("nhdd"))
        .stdout(predicate::str::contains("database"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn missing_subcommand_fails() {
    Command::cargo_bin("satellite")
        .unwrap()
        .assert()
        .failure();
}

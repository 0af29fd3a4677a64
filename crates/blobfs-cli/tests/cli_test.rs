//! Command-line behavior that does not need a running storage service

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn blobfs() -> Command {
    Command::cargo_bin("blobfs").unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    let mut cmd = blobfs();
    cmd.arg("--help");

    cmd.assert().success().stdout(
        predicate::str::contains("cat")
            .and(predicate::str::contains("read-at"))
            .and(predicate::str::contains("meta"))
            .and(predicate::str::contains("--azurite")),
    );
}

#[test]
fn test_head_accepts_byte_count() {
    let mut cmd = blobfs();
    cmd.arg("head").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--bytes"));
}

#[test]
fn test_uri_paths_are_invalid_arguments() {
    let mut cmd = blobfs();
    cmd.arg("--azurite")
        .arg("cat")
        .arg("abfss://container@account.dfs.core.windows.net/object");

    cmd.assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid argument"));
}

#[test]
fn test_container_is_not_a_file() {
    let mut cmd = blobfs();
    cmd.arg("--azurite").arg("read-at").arg("container").args(["--offset", "0", "--length", "4"]);

    cmd.assert().code(3);
}

#[test]
fn test_listing_rejects_dot_segments() {
    let mut cmd = blobfs();
    cmd.arg("--azurite").arg("ls").arg("container/../other");

    cmd.assert().code(3);
}

#[test]
fn test_missing_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut cmd = blobfs();
    cmd.arg("--config")
        .arg(temp_dir.path().join("absent.toml"))
        .arg("stat")
        .arg("container/object");

    cmd.assert().code(2);
}

#[test]
fn test_invalid_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("config.toml");
    fs::write(&config, "backend = \"azure\"\nread_buffer_size = 0\n").unwrap();

    let mut cmd = blobfs();
    cmd.arg("--config")
        .arg(&config)
        .arg("--account")
        .arg("acct")
        .arg("stat")
        .arg("container/object");

    cmd.assert()
        .code(3)
        .stderr(predicate::str::contains("read_buffer_size"));
}

#[test]
fn test_config_init_prints_example() {
    let mut cmd = blobfs();
    cmd.arg("--azurite").arg("config").arg("--init");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("[credential]"));
}

#[test]
fn test_config_show_applies_flags() {
    let mut cmd = blobfs();
    cmd.arg("--azurite")
        .arg("--endpoint")
        .arg("http://localhost:10000/devstoreaccount1")
        .arg("config")
        .arg("--show");

    cmd.assert().success().stdout(
        predicate::str::contains("Azurite")
            .and(predicate::str::contains("http://localhost:10000/devstoreaccount1"))
            .and(predicate::str::contains("<redacted>")),
    );
}

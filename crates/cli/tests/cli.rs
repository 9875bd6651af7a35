use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn write_config(dir: &std::path::Path, local_dir: &std::path::Path) -> std::path::PathBuf {
    let config_path = dir.join("agdir.toml");
    fs::write(
        &config_path,
        format!("[registry]\nlocal_dir = \"{}\"\n", local_dir.display()),
    )
    .unwrap();
    config_path
}

#[test]
fn push_then_pull_round_trips_through_local_dir_backend() {
    let workdir = tempfile::TempDir::new().unwrap();
    let store = workdir.path().join("store");
    let config_path = write_config(workdir.path(), &store);

    let record_path = workdir.path().join("record.json");
    fs::write(&record_path, r#"{"schema_version":"0.7.0","name":"cli-agent","version":"1.0.0"}"#).unwrap();

    let mut push = Command::cargo_bin("agdir").unwrap();
    let output = push
        .arg("--config")
        .arg(&config_path)
        .arg("push")
        .arg("--record-json")
        .arg(&record_path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let cid = String::from_utf8(output.stdout).unwrap().trim().to_string();
    assert!(!cid.is_empty());

    Command::cargo_bin("agdir")
        .unwrap()
        .arg("--config")
        .arg(&config_path)
        .arg("pull")
        .arg("--cid")
        .arg(&cid)
        .assert()
        .success()
        .stdout(predicate::str::contains("cli-agent"));
}

#[test]
fn pull_missing_cid_fails() {
    let workdir = tempfile::TempDir::new().unwrap();
    let store = workdir.path().join("store");
    let config_path = write_config(workdir.path(), &store);

    Command::cargo_bin("agdir")
        .unwrap()
        .arg("--config")
        .arg(&config_path)
        .arg("pull")
        .arg("--cid")
        .arg("bafkqaaa")
        .assert()
        .failure();
}

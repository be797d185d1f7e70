use std::fs;
use std::path::Path;
use assert_cmd::Command;

use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

/// `retrorestore` with an isolated home and no ambient API key.
fn retrorestore_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("retrorestore"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("GEMINI_API_KEY")
        .env_remove("API_KEY")
        .env_remove("RETRORESTORE_API_KEY")
        .env_remove("RETRORESTORE_MODEL")
        .env_remove("RETRORESTORE_ENDPOINT")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().expect("home");
    retrorestore_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("restore").and(contains("session")).and(contains("key")));
}

#[test]
fn config_init_then_show() {
    let home = TempDir::new().expect("home");
    retrorestore_cmd(home.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(contains("config.yaml"));
    assert!(home.path().join(".retrorestore/config.yaml").exists());

    retrorestore_cmd(home.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(contains("already exists"));

    retrorestore_cmd(home.path())
        .args(["config", "show"])
        .env("RETRORESTORE_MODEL", "override-model")
        .assert()
        .success()
        .stdout(contains("model: override-model").and(contains("image_size: 2K")));
}

#[test]
fn corrupt_config_is_a_setup_failure() {
    let home = TempDir::new().expect("home");
    let dir = home.path().join(".retrorestore");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("config.yaml"), "timeout_secs: [not a number\n").expect("write");

    retrorestore_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(contains("failed to load config"));
}

#[test]
fn key_status_and_clear_without_a_key() {
    let home = TempDir::new().expect("home");
    retrorestore_cmd(home.path())
        .args(["key", "status"])
        .assert()
        .success()
        .stdout(contains("not set"));
    retrorestore_cmd(home.path())
        .args(["key", "clear"])
        .assert()
        .success()
        .stdout(contains("no stored API key"));
}

#[test]
fn key_set_stores_and_status_reports_it() {
    let home = TempDir::new().expect("home");
    retrorestore_cmd(home.path())
        .args(["key", "set"])
        .write_stdin("secret-key\n")
        .assert()
        .success()
        .stdout(contains("API key stored"));

    let stored = home.path().join(".retrorestore/credentials");
    assert_eq!(fs::read_to_string(&stored).expect("read"), "secret-key");

    retrorestore_cmd(home.path())
        .args(["key", "status"])
        .assert()
        .success()
        .stdout(contains("stored in").and(contains("secret-key").not()));

    retrorestore_cmd(home.path())
        .args(["key", "status"])
        .env("GEMINI_API_KEY", "from-env")
        .assert()
        .success()
        .stdout(contains("from environment (GEMINI_API_KEY)"));
}

#[test]
fn restore_with_no_images_is_a_noop() {
    let home = TempDir::new().expect("home");
    let input = TempDir::new().expect("input");
    fs::write(input.path().join("notes.txt"), b"not an image").expect("write");

    retrorestore_cmd(home.path())
        .arg("restore")
        .arg(input.path())
        .assert()
        .success()
        .stdout(contains("No images found."));
}

#[test]
fn restore_without_a_key_fails_before_dispatch() {
    let home = TempDir::new().expect("home");
    let input = TempDir::new().expect("input");
    fs::write(input.path().join("old.png"), b"png bytes").expect("write");
    let out = input.path().join("out");

    retrorestore_cmd(home.path())
        .arg("restore")
        .arg(input.path())
        .arg("--out")
        .arg(&out)
        .write_stdin("")
        .assert()
        .failure()
        .stderr(contains("no API key"));
    assert!(!out.exists());
}

#[test]
fn unreachable_endpoint_marks_items_failed_but_exits_cleanly() {
    let home = TempDir::new().expect("home");
    let input = TempDir::new().expect("input");
    fs::write(input.path().join("old.png"), b"png bytes").expect("write");
    let out = input.path().join("out");

    let output = retrorestore_cmd(home.path())
        .arg("restore")
        .arg(input.path().join("old.png"))
        .args(["--json", "--api-key", "test-key", "--out"])
        .arg(&out)
        .env("RETRORESTORE_ENDPOINT", "http://127.0.0.1:9/v1beta")
        .output()
        .expect("run");
    assert!(output.status.success(), "{output:?}");

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["summary"]["failed"], 1);
    assert_eq!(json["items"][0]["name"], "old.png");
    assert_eq!(json["items"][0]["status"], "ERROR");
    assert!(json["items"][0]["saved_to"].is_null());
    assert!(!out.join("old_restored.png").exists());
}

#[test]
fn session_restore_without_a_key_reports_instead_of_prompting() {
    let home = TempDir::new().expect("home");
    let input = TempDir::new().expect("input");
    let photo = input.path().join("old.png");
    fs::write(&photo, b"png bytes").expect("write");

    retrorestore_cmd(home.path())
        .arg("session")
        .write_stdin(format!("add {}\nrestore\nlist\nquit\n", photo.display()))
        .assert()
        .success()
        .stdout(contains("run `retrorestore key set`").and(contains("IDLE")))
        .stderr(contains("Gemini API key:").not());
    assert!(!home.path().join(".retrorestore/credentials").exists());
}

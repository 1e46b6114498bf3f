//! Smoke tests for the `hanzi` binary. None of them need a network.

use assert_cmd::Command;
use predicates::prelude::*;

/// The binary with a clean environment and a throwaway working directory.
fn hanzi(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hanzi").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("HANZI_API_URL")
        .env_remove("EXPO_PUBLIC_API_URL")
        .env_remove("SUPABASE_URL")
        .env_remove("SUPABASE_ANON_KEY")
        .env_remove("RUST_LOG")
        .env("HANZI_SESSION_FILE", dir.path().join("session.json"));
    cmd
}

#[test]
fn version_prints_crate_version() {
    let dir = tempfile::tempdir().unwrap();
    hanzi(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn notifications_fall_back_to_the_local_feed() {
    let dir = tempfile::tempdir().unwrap();
    hanzi(&dir)
        .args(["notifications", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[n1] คำศัพท์ใหม่ถูกเพิ่ม"))
        .stdout(predicate::str::contains("[n2] ยินดีต้อนรับ!"));
}

#[test]
fn chat_without_api_url_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    hanzi(&dir)
        .args(["chat", "你好"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HANZI_API_URL"));
}

#[test]
fn word_commands_need_a_backend() {
    let dir = tempfile::tempdir().unwrap();
    hanzi(&dir)
        .args(["words", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SUPABASE_URL is not configured"));
}

#[test]
fn invalid_hsk_level_is_rejected_by_the_parser() {
    let dir = tempfile::tempdir().unwrap();
    hanzi(&dir)
        .args(["words", "add", "好", "ดี", "--hsk", "high"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--hsk"));
}

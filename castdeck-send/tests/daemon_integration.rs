//! Integration tests for the castdeck-send daemon

use assert_cmd::Command;
use chrono::{Duration, Utc};
use libcastdeck::types::AccountHandle;
use libcastdeck::{Account, Database, PostStatus, ScheduledPost};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

struct TestEnv {
    _temp_dir: TempDir,
    config_path: String,
    db_path: String,
}

/// Config with the mock platform enabled and a fresh database
async fn setup_test_env() -> TestEnv {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("test.db");

    let config_content = format!(
        r#"
[database]
path = "{}"

[dispatch]
poll_interval = 1
max_attempts = 3
retry_delay = 1

[platforms.mock]
enabled = true
"#,
        db_path.display().to_string().replace('\\', "/")
    );
    fs::write(&config_path, config_content).unwrap();

    let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
    db.close().await;

    TestEnv {
        config_path: config_path.to_str().unwrap().to_string(),
        db_path: db_path.to_str().unwrap().to_string(),
        _temp_dir: temp_dir,
    }
}

/// Insert an account on `platform` with one post due ten seconds ago
async fn create_due_post(db_path: &str, platform: &str) -> String {
    let db = Database::new(db_path).await.unwrap();
    let account = Account::from_handle(
        platform,
        AccountHandle {
            platform_user_id: "user-1".to_string(),
            username: "tester".to_string(),
            access_token: "token".to_string(),
            refresh_token: None,
        },
    );
    db.insert_account(&account).await.unwrap();

    let post = ScheduledPost::new(
        account.id.clone(),
        "Test scheduled post".to_string(),
        vec![],
        Utc::now() - Duration::seconds(10),
    );
    db.insert_post(&post).await.unwrap();
    db.close().await;
    post.id
}

async fn post_status(db_path: &str, post_id: &str) -> ScheduledPost {
    let db = Database::new(db_path).await.unwrap();
    let post = db.get_post(post_id).await.unwrap().unwrap();
    db.close().await;
    post
}

fn send_cmd(env: &TestEnv) -> Command {
    let mut cmd = Command::cargo_bin("castdeck-send").unwrap();
    cmd.env("CASTDECK_CONFIG", &env.config_path)
        .env("CASTDECK_DB_PATH", &env.db_path);
    cmd
}

#[tokio::test]
async fn test_once_publishes_due_post() {
    let env = setup_test_env().await;
    let post_id = create_due_post(&env.db_path, "mock").await;

    send_cmd(&env).arg("--once").assert().success();

    let post = post_status(&env.db_path, &post_id).await;
    assert_eq!(post.status, PostStatus::Published);
    assert!(post.platform_post_id.unwrap().starts_with("mock-"));
}

#[tokio::test]
async fn test_once_twice_publishes_once() {
    let env = setup_test_env().await;
    let post_id = create_due_post(&env.db_path, "mock").await;

    send_cmd(&env).arg("--once").assert().success();
    let first = post_status(&env.db_path, &post_id).await;

    send_cmd(&env).arg("--once").assert().success();
    let second = post_status(&env.db_path, &post_id).await;

    assert_eq!(first.platform_post_id, second.platform_post_id);
    assert_eq!(second.attempts, 1);
}

#[tokio::test]
async fn test_unknown_platform_fails_post() {
    let env = setup_test_env().await;
    let post_id = create_due_post(&env.db_path, "myspace").await;

    send_cmd(&env).arg("--once").assert().success();

    let post = post_status(&env.db_path, &post_id).await;
    assert_eq!(post.status, PostStatus::Failed);
    assert!(post.last_error.unwrap().contains("myspace"));
}

#[tokio::test]
async fn test_empty_queue_exits_cleanly() {
    let env = setup_test_env().await;
    send_cmd(&env).arg("--once").assert().success();
}

#[test]
fn test_invalid_config_is_a_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let invalid_config = temp_dir.path().join("invalid.toml");
    fs::write(&invalid_config, "invalid toml content [[[").unwrap();

    Command::cargo_bin("castdeck-send")
        .unwrap()
        .env("CASTDECK_CONFIG", invalid_config.to_str().unwrap())
        .arg("--once")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Configuration error"));
}

#[tokio::test]
async fn test_zero_poll_interval_rejected() {
    let env = setup_test_env().await;
    send_cmd(&env)
        .args(["--once", "--poll-interval", "0"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("poll_interval"));
}

#[test]
fn test_help_describes_daemon() {
    Command::cargo_bin("castdeck-send")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scheduled posting"))
        .stdout(predicate::str::contains("--poll-interval"));
}

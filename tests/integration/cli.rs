use anyhow::Result;
use assert_cmd::Command;
use autoupdate::test_utils::fixtures::TestLayout;
use autoupdate::test_utils::tar_gz_bytes;
use predicates::prelude::*;
use serde_json::json;
use std::path::PathBuf;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Write `env.config` next to the live tree and return its path.
fn write_config(env: &TestLayout) -> Result<PathBuf> {
    let path = env.temp.path().join("config.toml");
    std::fs::write(&path, toml::to_string_pretty(&env.config)?)?;
    Ok(path)
}

fn autoupdate(config: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("autoupdate").unwrap();
    cmd.arg("--config").arg(config).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let mut cmd = Command::cargo_bin("autoupdate").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("current"));
}

#[test]
fn test_update_help_lists_channels() {
    let mut cmd = Command::cargo_bin("autoupdate").unwrap();
    cmd.args(["update", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--channel"))
        .stdout(predicate::str::contains("release"));
}

#[test]
fn test_current_prints_marker_version() -> Result<()> {
    let env = TestLayout::new(&["plugins"]);
    env.write_marker("v3.1.0");
    let config = write_config(&env)?;

    autoupdate(&config)
        .arg("current")
        .assert()
        .success()
        .stdout(predicate::str::contains("v3.1.0"));
    Ok(())
}

#[test]
fn test_current_without_marker_prints_sentinel() -> Result<()> {
    let env = TestLayout::new(&["plugins"]);
    let config = write_config(&env)?;

    autoupdate(&config)
        .arg("current")
        .assert()
        .success()
        .stdout(predicate::str::contains("v0.0.0"));
    Ok(())
}

#[test]
fn test_invalid_config_reports_error() -> Result<()> {
    let temp = tempfile::TempDir::new()?;
    let config = temp.path().join("config.toml");
    std::fs::write(&config, "[paths\napp_root = ")?;

    autoupdate(&config)
        .arg("current")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error"));
    Ok(())
}

#[test]
fn test_update_with_unreachable_index_fails() -> Result<()> {
    let mut env = TestLayout::new(&["plugins"]);
    env.config.sources.release_url = "http://127.0.0.1:1/releases/latest".to_string();
    env.config.sources.request_timeout_secs = 2;
    env.write_marker("v1.0.0");
    env.write_live("app/plugins/core.py", "plugin v1.0.0");
    let config = write_config(&env)?;

    autoupdate(&config)
        .arg("update")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("latest release"));

    assert_eq!(env.read_live("app/plugins/core.py").as_deref(), Some("plugin v1.0.0"));
    assert_eq!(env.marker().as_deref(), Some("__version__: v1.0.0"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_check_reports_available_update() -> Result<()> {
    let server = MockServer::start().await;
    let env = TestLayout::new(&["plugins"]).with_mock_sources(&server.uri());
    env.write_marker("v1.0.0");
    let config = write_config(&env)?;

    Mock::given(method("GET"))
        .and(path("/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "v2.0.0",
            "body": "Bigger and better",
            "tarball_url": format!("{}/tarball/v2.0.0", server.uri()),
        })))
        .mount(&server)
        .await;

    let assert = tokio::task::spawn_blocking(move || autoupdate(&config).arg("check").assert())
        .await?;
    assert
        .success()
        .stdout(predicate::str::contains("v1.0.0"))
        .stdout(predicate::str::contains("v2.0.0"))
        .stdout(predicate::str::contains("Bigger and better"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_update_command_swaps_tree() -> Result<()> {
    let server = MockServer::start().await;
    let env = TestLayout::new(&["plugins"]).with_mock_sources(&server.uri());
    env.write_marker("v1.0.0");
    env.write_live("app/plugins/core.py", "plugin v1.0.0");
    let config = write_config(&env)?;

    Mock::given(method("GET"))
        .and(path("/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "v1.1.0",
            "tarball_url": format!("{}/tarball/v1.1.0", server.uri()),
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tarball/v1.1.0"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/cdn/archive.tar.gz", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdn/archive.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(tar_gz_bytes(&[(
            "app-v1.1.0/app/plugins/core.py",
            "plugin v1.1.0",
        )])))
        .mount(&server)
        .await;

    let assert = tokio::task::spawn_blocking(move || {
        autoupdate(&config).args(["update", "--recipient", "ops"]).assert()
    })
    .await?;
    assert
        .success()
        .stdout(predicate::str::contains("Update complete"))
        .stdout(predicate::str::contains("v1.0.0 -> v1.1.0"))
        .stderr(predicate::str::contains("[to ops]"));

    assert_eq!(env.read_live("app/plugins/core.py").as_deref(), Some("plugin v1.1.0"));
    assert_eq!(env.read_backup("plugins/core.py").as_deref(), Some("plugin v1.0.0"));
    assert_eq!(env.marker().as_deref(), Some("__version__: v1.1.0"));
    Ok(())
}

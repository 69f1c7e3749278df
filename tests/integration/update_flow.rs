use anyhow::Result;
use autoupdate::core::UpdateError;
use autoupdate::test_utils::fixtures::TestLayout;
use autoupdate::test_utils::{init_test_logging, tar_gz_bytes};
use autoupdate::upgrade::{Channel, RecordingNotifier, SelfUpdater, UpdatePhase};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serve release `name` whose tarball redirects once to `/cdn/archive.tar.gz`.
async fn serve_release(server: &MockServer, name: &str, archive: Vec<u8>) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": name,
            "created_at": "2024-06-01T08:00:00Z",
            "body": "Release notes",
            "tarball_url": format!("{}/tarball/{}", server.uri(), name),
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/tarball/{name}")))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/cdn/archive.tar.gz", server.uri())),
        )
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdn/archive.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .expect(1)
        .mount(server)
        .await;
}

fn release_archive(root: &str, tag: &str) -> Vec<u8> {
    let plugins = format!("{root}/app/plugins/core.py");
    let data = format!("{root}/app/data/seed.json");
    let req = format!("{root}/requirements.txt");
    let plugin_body = format!("plugin {tag}");
    let data_body = format!("data {tag}");
    let req_body = format!("req {tag}");
    tar_gz_bytes(&[
        (plugins.as_str(), plugin_body.as_str()),
        (data.as_str(), data_body.as_str()),
        (req.as_str(), req_body.as_str()),
    ])
}

/// Release update end to end: metadata, redirect, download, swap, marker.
#[tokio::test]
async fn test_release_update_end_to_end() -> Result<()> {
    init_test_logging(None);
    let server = MockServer::start().await;
    let env = TestLayout::new(&["plugins", "data"]).with_mock_sources(&server.uri());

    env.write_marker("v1.0.0");
    env.write_live("requirements.txt", "req v1.0.0");
    env.write_live("app/plugins/core.py", "plugin v1.0.0");
    env.write_live("app/data/seed.json", "data v1.0.0");
    env.write_live("app/untouched/keep.txt", "kept");

    serve_release(&server, "v1.1.0", release_archive("owner-app-1a2b3c4", "v1.1.0")).await;

    let notifier = Arc::new(RecordingNotifier::default());
    let updater = SelfUpdater::new(&env.config, env.layout.clone(), notifier.clone())?;
    let message = updater.perform_update(Channel::Release, "admin").await?;

    assert!(message.contains("v1.0.0 -> v1.1.0"), "message was: {message}");
    assert_eq!(env.marker().as_deref(), Some("__version__: v1.1.0"));

    // Live tree holds the new generation
    assert_eq!(env.read_live("requirements.txt").as_deref(), Some("req v1.1.0"));
    assert_eq!(env.read_live("app/plugins/core.py").as_deref(), Some("plugin v1.1.0"));
    assert_eq!(env.read_live("app/data/seed.json").as_deref(), Some("data v1.1.0"));
    assert_eq!(env.read_live("app/untouched/keep.txt").as_deref(), Some("kept"));

    // Backup holds the previous generation
    assert_eq!(env.read_backup("requirements.txt").as_deref(), Some("req v1.0.0"));
    assert_eq!(env.read_backup("plugins/core.py").as_deref(), Some("plugin v1.0.0"));
    assert_eq!(env.read_backup("data/seed.json").as_deref(), Some("data v1.0.0"));

    assert!(!env.layout.staging_dir.exists(), "staging must be removed");
    assert_eq!(updater.phase(), UpdatePhase::Done);
    assert_eq!(notifier.sent().len(), 1);

    assert_eq!(updater.current_version().await, "v1.1.0");
    Ok(())
}

/// Two consecutive updates keep only the generation before the latest one.
#[tokio::test]
async fn test_consecutive_updates_keep_one_backup_generation() -> Result<()> {
    let server = MockServer::start().await;
    let env = TestLayout::new(&["plugins", "data"]).with_mock_sources(&server.uri());
    env.write_marker("v1.0.0");
    env.write_live("app/plugins/core.py", "plugin v1.0.0");
    env.write_live("app/plugins/legacy.py", "only in v1.0.0");

    let updater =
        SelfUpdater::new(&env.config, env.layout.clone(), Arc::new(RecordingNotifier::default()))?;

    serve_release(&server, "v1.1.0", release_archive("app-v1.1.0", "v1.1.0")).await;
    updater.perform_update(Channel::Release, "admin").await?;

    serve_release(&server, "v1.2.0", release_archive("app-v1.2.0", "v1.2.0")).await;
    let message = updater.perform_update(Channel::Release, "admin").await?;

    assert!(message.contains("v1.1.0 -> v1.2.0"));
    assert_eq!(env.read_backup("plugins/core.py").as_deref(), Some("plugin v1.1.0"));
    assert_eq!(env.read_backup("plugins/legacy.py"), None);
    assert_eq!(env.read_backup("requirements.txt").as_deref(), Some("req v1.1.0"));
    assert_eq!(env.marker().as_deref(), Some("__version__: v1.2.0"));
    Ok(())
}

/// A truncated archive aborts before the live tree is touched.
#[tokio::test]
async fn test_corrupt_archive_aborts_cleanly() -> Result<()> {
    let server = MockServer::start().await;
    let env = TestLayout::new(&["plugins"]).with_mock_sources(&server.uri());
    env.write_marker("v1.0.0");
    env.write_live("app/plugins/core.py", "plugin v1.0.0");

    let mut archive = release_archive("app-v1.1.0", "v1.1.0");
    archive.truncate(archive.len() / 2);
    serve_release(&server, "v1.1.0", archive).await;

    let updater =
        SelfUpdater::new(&env.config, env.layout.clone(), Arc::new(RecordingNotifier::default()))?;
    let err = updater.perform_update(Channel::Release, "admin").await.unwrap_err();

    assert!(matches!(err, UpdateError::ExtractionFailed { .. }), "got {err:?}");
    assert!(!err.touched_live_tree());
    assert_eq!(env.read_live("app/plugins/core.py").as_deref(), Some("plugin v1.0.0"));
    assert_eq!(env.read_backup("plugins/core.py"), None);
    assert_eq!(env.marker().as_deref(), Some("__version__: v1.0.0"));
    assert!(!env.layout.staging_dir.exists());
    Ok(())
}

mod common;

use serde_json::json;
use std::fs;
use std::time::Duration;
use tasker_config::{Config, ConfigError, FileSource, LoaderOptions, StaticVariables};
use tempfile::TempDir;

const POLL: Duration = Duration::from_millis(50);

fn write(dir: &TempDir, name: &str, body: &str) {
    fs::write(dir.path().join(name), body).unwrap();
}

#[tokio::test]
async fn test_directory_source_merges_files_in_name_order() {
    let dir = TempDir::new().unwrap();
    write(&dir, "10-foo.yaml", "foo:\n  baz: \"2\"\n  biu: example\nhello:\n  a: b\n");
    write(
        &dir,
        "20-bar.json",
        r#"{"foo": {"bar": 3, "baz": "aaaa"}, "hey": {"good": "bad", "qux": "quux"}}"#,
    );
    write(&dir, ".hidden.yaml", "foo:\n  baz: hidden\n");

    let config = Config::builder()
        .with_source(FileSource::new(dir.path()))
        .build()
        .unwrap();
    config.load().await.unwrap();

    assert_eq!(
        config.value("").unwrap().raw(),
        &json!({
            "foo": {"baz": "aaaa", "biu": "example", "bar": 3},
            "hello": {"a": "b"},
            "hey": {"good": "bad", "qux": "quux"}
        })
    );
}

#[tokio::test]
async fn test_toml_and_yaml_files_layer() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "base.toml",
        "[service]\nname = \"kratos_app\"\n\n[http.server]\naddr = \"0.0.0.0\"\nport = 8000\n",
    );
    write(
        &dir,
        "override.yml",
        "http:\n  server:\n    port: 9000\n    label: \"${service.name}@${http.server.addr}\"\n",
    );

    let config = Config::builder()
        .with_file(dir.path().join("base.toml"))
        .with_file(dir.path().join("override.yml"))
        .with_variables(StaticVariables::new())
        .build()
        .unwrap();
    config.load().await.unwrap();

    assert_eq!(config.value("http.server.port").unwrap().as_i64().unwrap(), 9000);
    assert_eq!(
        config.value("http.server.label").unwrap().as_str().unwrap(),
        "kratos_app@0.0.0.0"
    );
}

#[tokio::test]
async fn test_missing_path_fails_initial_load() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .with_source(FileSource::new(dir.path().join("absent.yaml")))
        .build()
        .unwrap();

    let error = config.load().await.unwrap_err();
    assert!(matches!(error, ConfigError::SourceUnavailable { .. }));
}

#[tokio::test]
async fn test_file_change_is_picked_up_by_polling() {
    let dir = TempDir::new().unwrap();
    write(&dir, "app.yaml", "service:\n  name: before\n");

    let options = LoaderOptions {
        poll_interval_ms: POLL.as_millis() as u64,
        ..LoaderOptions::default()
    };
    let config = Config::builder()
        .with_options(options)
        .with_file(dir.path())
        .build()
        .unwrap();
    config.load().await.unwrap();

    let mut changes = config.subscribe("service.name");
    write(&dir, "app.yaml", "service:\n  name: after-the-change\n");

    let event = tokio::time::timeout(Duration::from_secs(5), changes.recv())
        .await
        .expect("file change detected within timeout")
        .expect("subscription open");
    assert_eq!(event.previous, Some(json!("before")));
    assert_eq!(event.current, Some(json!("after-the-change")));
    assert_eq!(
        config.value("service.name").unwrap().as_str().unwrap(),
        "after-the-change"
    );
}

#[tokio::test]
async fn test_options_set_after_with_file_apply_to_polling() {
    let dir = TempDir::new().unwrap();
    write(&dir, "app.yaml", "service:\n  name: before\n");

    // Polling at the default interval would miss the deadline below
    let options = LoaderOptions {
        poll_interval_ms: POLL.as_millis() as u64,
        ..LoaderOptions::default()
    };
    let config = Config::builder()
        .with_file(dir.path())
        .with_options(options)
        .build()
        .unwrap();
    config.load().await.unwrap();

    let mut changes = config.subscribe("service.name");
    write(&dir, "app.yaml", "service:\n  name: polled-quickly\n");

    let event = tokio::time::timeout(Duration::from_millis(1000), changes.recv())
        .await
        .expect("change detected at the configured interval")
        .expect("subscription open");
    assert_eq!(event.current, Some(json!("polled-quickly")));
}

#[tokio::test]
async fn test_broken_file_keeps_previous_snapshot() {
    let dir = TempDir::new().unwrap();
    write(&dir, "app.yaml", "service:\n  name: stable\n");

    let config = Config::builder()
        .with_source(FileSource::new(dir.path()).with_poll_interval(POLL))
        .build()
        .unwrap();
    config.load().await.unwrap();

    write(&dir, "app.yaml", "service: [unterminated\n");
    let error = config.reload().await.unwrap_err();

    assert!(matches!(error, ConfigError::DecodeError { .. }));
    assert_eq!(
        config.value("service.name").unwrap().as_str().unwrap(),
        "stable"
    );
}

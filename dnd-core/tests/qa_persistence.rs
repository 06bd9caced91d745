//! QA tests for the JSON character store.
//!
//! These tests verify that characters survive a restart and that a damaged
//! or foreign store is reported instead of silently replaced.
//! Run with: `cargo test -p dnd-core --test qa_persistence`

use dnd_core::persist::{
    CharacterRepository, JsonFileRepository, PersistError, SavedState, UserKey,
};
use dnd_core::session::{Roller, RollerConfig};
use dnd_core::testing::{EchoDice, TestHarness};
use std::sync::Arc;
use tempfile::TempDir;

const URSO: &str = "3 16 12 14 6 10 6 | str con | athletics |";

async fn open_harness(dir: &TempDir) -> TestHarness {
    let repository = JsonFileRepository::open(dir.path().join("cache.json"))
        .await
        .expect("Failed to open store");
    TestHarness::with_repository(Arc::new(repository))
}

#[tokio::test]
async fn test_missing_store_starts_empty() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("nested").join("cache.json");

    let repository = JsonFileRepository::open(&path).await.unwrap();
    assert_eq!(repository.path(), path.as_path());
    let key = UserKey::new("guild", "user");
    assert!(repository.load_user(&key).await.unwrap().characters.is_empty());
    assert!(!path.exists());

    // The first save creates the directory and the file.
    repository.save_user(&key, Default::default()).await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn test_characters_survive_restart() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    {
        let harness = open_harness(&temp_dir).await;
        harness.create("urso", URSO).await.unwrap();
        harness.send("!m set axe 1d12+$str_mod").await.unwrap();
        harness.send("!v set rage 2").await.unwrap();
    }

    let harness = open_harness(&temp_dir).await;
    assert_eq!(
        harness.send("!r axe rage").await.unwrap(),
        "Urso rolled using the macro axe with rage:\n1d12+3+2"
    );

    let record = harness.record().await.unwrap();
    assert_eq!(record.name, "Tester");
    assert_eq!(record.active.as_deref(), Some("urso"));
}

#[tokio::test]
async fn test_store_layout() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let harness = open_harness(&temp_dir).await.as_user("4242");
    harness.create("urso", URSO).await.unwrap();

    let content = std::fs::read_to_string(temp_dir.path().join("cache.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&content).unwrap();

    assert_eq!(json["version"], 1);
    let user = &json["guilds"]["guild"]["users"]["4242"];
    assert_eq!(user["name"], "Tester");
    assert_eq!(user["active"], "urso");
    assert_eq!(user["characters"]["urso"]["level"], 3);

    let state = SavedState::load_json(temp_dir.path().join("cache.json"))
        .await
        .unwrap();
    assert!(state.user(&UserKey::new("guild", "4242")).is_some());
}

#[tokio::test]
async fn test_version_mismatch_is_an_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("cache.json");
    std::fs::write(&path, r#"{"version": 99, "guilds": {}}"#).unwrap();

    match JsonFileRepository::open(&path).await {
        Err(PersistError::VersionMismatch { expected, found }) => {
            assert_eq!(expected, 1);
            assert_eq!(found, 99);
        }
        other => panic!("expected a version mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_corrupt_store_is_an_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("cache.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        JsonFileRepository::open(&path).await,
        Err(PersistError::Json(_))
    ));
}

#[tokio::test]
async fn test_roller_open_uses_storage_dir() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = RollerConfig::new(temp_dir.path()).with_placeholder_name("Someone");

    let roller = Roller::open(config).await.unwrap().with_dice(Arc::new(EchoDice));
    let reply = roller.handle("guild", "user", "Ana", "!r str").await.unwrap();
    assert_eq!(
        reply.as_deref(),
        Some("Someone rolled for a(n) strength check:\n1d20+0")
    );
    assert!(temp_dir.path().join("cache.json").exists());
}

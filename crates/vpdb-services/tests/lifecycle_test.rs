#[path = "helpers/mod.rs"]
mod helpers;

use helpers::entities::FakeReleases;
use helpers::fixtures::image_dimensions;
use helpers::{setup_test_env, TestEnv};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;
use vpdb_core::models::FileType;
use vpdb_core::AppError;
use vpdb_services::{CreateEntity, EntityLifecycle};

fn lifecycle(env: &TestEnv, releases: Arc<FakeReleases>) -> EntityLifecycle {
    EntityLifecycle::new(
        Arc::new(env.tracker()),
        Arc::new(env.coordinator()),
        releases,
    )
}

fn release(name: &str, backglass: &str, playfield: &str) -> Value {
    json!({
        "name": name,
        "_backglass": backglass,
        "versions": [{ "files": [{ "_playfield_image": playfield }] }]
    })
}

#[tokio::test]
async fn test_create_activates_and_commits_rotation() {
    let env = setup_test_env().await;
    let owner = Uuid::new_v4();
    let backglass = env.upload_png("backglass", 40, 30, owner).await;
    let playfield = env.upload_png("playfield-fs", 40, 80, owner).await;
    let releases = Arc::new(FakeReleases::default());

    let created = lifecycle(&env, releases.clone())
        .create(CreateEntity {
            document: release("Twilight Zone", &backglass.id, &playfield.id),
            owner_id: owner,
            rotation: Some(format!("{}:90", playfield.id)),
        })
        .await
        .unwrap();

    assert!(releases.get(&created.entity_key).await.is_some());
    let populated = &created.document["versions"][0]["files"][0]["_playfield_image"];
    assert_eq!(populated["id"], json!(playfield.id));
    assert_eq!(populated["is_active"], json!(true));

    let playfield = env.reload(&playfield).await;
    assert_eq!(playfield.activated_for.as_deref(), Some(created.entity_key.as_str()));
    assert_eq!(playfield.committed_rotation(), 90);
    assert_eq!(playfield.pending_rotation(), None);
    assert_eq!(playfield.file_type, FileType::PlayfieldWs);
    assert_eq!(image_dimensions(&env.original_bytes(&playfield).await), (80, 40));
    assert_eq!(env.scheduler.count_for(playfield.internal_id), 2);
    assert!(env.reload(&backglass).await.is_active);
}

#[tokio::test]
async fn test_failed_validation_rolls_back_rotation() {
    let env = setup_test_env().await;
    let owner = Uuid::new_v4();
    let backglass = env.upload_png("backglass", 40, 30, owner).await;
    let playfield = env.upload_png("playfield-fs", 40, 80, owner).await;
    let uploaded = env.original_bytes(&playfield).await;
    let releases = Arc::new(FakeReleases::default());

    let err = lifecycle(&env, releases.clone())
        .create(CreateEntity {
            document: release("", &backglass.id, &playfield.id),
            owner_id: owner,
            rotation: Some(format!("{}:270", playfield.id)),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(ref e) if e.has_path("name")));
    assert_eq!(releases.len().await, 0);
    assert_eq!(env.original_bytes(&playfield).await, uploaded);
    let restored = env.reload(&playfield).await;
    assert!(restored.preprocessed.is_none());
    assert_eq!(restored.file_type, FileType::PlayfieldFs);
    assert!(!restored.is_active);
    assert!(!env.reload(&backglass).await.is_active);
}

#[tokio::test]
async fn test_reference_errors_are_aggregated_with_entity_errors() {
    let env = setup_test_env().await;
    let owner = Uuid::new_v4();
    let playfield = env.upload_png("playfield-fs", 40, 80, Uuid::new_v4()).await;

    let err = lifecycle(&env, Arc::new(FakeReleases::default()))
        .create(CreateEntity {
            document: release("", "nope", &playfield.id),
            owner_id: owner,
            rotation: None,
        })
        .await
        .unwrap_err();

    match err {
        AppError::Validation(errors) => {
            assert!(errors.has_path("_backglass"));
            assert!(errors.has_path("versions.0.files.0._playfield_image"));
            assert!(errors.has_path("name"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_directive_touches_nothing() {
    let env = setup_test_env().await;
    let owner = Uuid::new_v4();
    let backglass = env.upload_png("backglass", 40, 30, owner).await;
    let playfield = env.upload_png("playfield-fs", 40, 80, owner).await;

    let err = lifecycle(&env, Arc::new(FakeReleases::default()))
        .create(CreateEntity {
            document: release("Medieval Madness", &backglass.id, &playfield.id),
            owner_id: owner,
            rotation: Some(format!("{}:45", playfield.id)),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(env.reload(&playfield).await, playfield);
}

#[tokio::test]
async fn test_active_files_cannot_be_reused() {
    let env = setup_test_env().await;
    let owner = Uuid::new_v4();
    let backglass = env.upload_png("backglass", 40, 30, owner).await;
    let playfield = env.upload_png("playfield-fs", 40, 80, owner).await;
    let releases = Arc::new(FakeReleases::default());
    let lifecycle = lifecycle(&env, releases.clone());

    lifecycle
        .create(CreateEntity {
            document: release("First", &backglass.id, &playfield.id),
            owner_id: owner,
            rotation: None,
        })
        .await
        .unwrap();

    let err = lifecycle
        .create(CreateEntity {
            document: release("Second", &backglass.id, &playfield.id),
            owner_id: owner,
            rotation: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(ref e) if e.has_path("_backglass")));
    assert_eq!(releases.len().await, 1);
}

#[tokio::test]
async fn test_delete_cascades_to_files() {
    let env = setup_test_env().await;
    let owner = Uuid::new_v4();
    let backglass = env.upload_png("backglass", 40, 30, owner).await;
    let playfield = env.upload_png("playfield-fs", 40, 80, owner).await;
    let releases = Arc::new(FakeReleases::default());
    let lifecycle = lifecycle(&env, releases.clone());

    let created = lifecycle
        .create(CreateEntity {
            document: release("Doomed", &backglass.id, &playfield.id),
            owner_id: owner,
            rotation: None,
        })
        .await
        .unwrap();

    let report = lifecycle
        .delete(&created.entity_key, &created.document)
        .await
        .unwrap();

    assert_eq!(report.removed.len(), 2);
    assert!(releases.get(&created.entity_key).await.is_none());
    assert!(env.repository.is_empty().await);
    assert!(!env.storage_root_has_files().await);
}

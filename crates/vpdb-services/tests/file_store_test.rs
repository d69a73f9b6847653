#[path = "helpers/mod.rs"]
mod helpers;

use helpers::fixtures::{descriptor, gradient_png};
use helpers::storage::{FailingExtractor, FailingRepository, SlowExtractor};
use helpers::{setup_test_env, setup_with_extractor};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use vpdb_core::models::{FileType, ORIGINAL_VARIATION};
use vpdb_core::AppError;
use vpdb_db::FileRepository;
use vpdb_services::{CreateOptions, PathOptions};
use vpdb_storage::Storage;

#[tokio::test]
async fn test_create_stores_metadata_and_schedules_variations() {
    let env = setup_test_env().await;
    let owner = Uuid::new_v4();

    let file = env.upload_png("backglass", 64, 32, owner).await;

    assert_eq!(file.file_type, FileType::Backglass);
    assert_eq!(file.created_by, owner);
    assert!(!file.is_active);
    let metadata = file.metadata.as_ref().expect("metadata stored");
    assert_eq!(metadata.dimensions(), Some((64, 32)));
    assert_eq!(file.bytes, metadata.size_bytes);

    let key = &file.storage_paths[ORIGINAL_VARIATION];
    assert_eq!(key, &env.original_key(&file));
    assert!(env.storage.exists(key).await.unwrap());
    assert_eq!(env.scheduler.scheduled(), vec![file.internal_id]);
}

#[tokio::test]
async fn test_invalid_descriptor_writes_nothing() {
    let env = setup_test_env().await;
    let mut bad = descriptor("table", "text/html", Uuid::new_v4());
    bad.original_filename = String::new();

    let err = env
        .store
        .create(&bad, Cursor::new(gradient_png(8, 8)), CreateOptions::default())
        .await
        .unwrap_err();

    match err {
        AppError::Validation(errors) => {
            assert!(errors.has_path("file_type"));
            assert!(errors.has_path("mime_type"));
            assert!(errors.has_path("original_filename"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(env.repository.is_empty().await);
    assert!(env.scheduler.scheduled().is_empty());
}

#[tokio::test]
async fn test_mime_type_must_fit_file_type() {
    let env = setup_test_env().await;

    let err = env
        .store
        .create(
            &descriptor("rom", "image/png", Uuid::new_v4()),
            Cursor::new(gradient_png(8, 8)),
            CreateOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(ref e) if e.has_path("mime_type")));
    assert!(env.repository.is_empty().await);
}

#[tokio::test]
async fn test_failed_metadata_update_removes_record_and_bytes() {
    let env = setup_test_env().await;
    let repository = Arc::new(FailingRepository::new(env.repository.clone()));
    repository.fail_updates();
    let store = env.store_with_repository(repository);

    let err = store
        .create(
            &descriptor("backglass", "image/png", Uuid::new_v4()),
            Cursor::new(gradient_png(64, 32)),
            CreateOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Internal(_)));
    assert!(env.repository.is_empty().await);
    assert!(!env.storage_root_has_files().await);
    assert!(env.scheduler.scheduled().is_empty());
}

#[tokio::test]
async fn test_metadata_error_removes_record_and_bytes() {
    let env = setup_test_env().await;

    let err = env
        .store
        .create(
            &descriptor("backglass", "image/png", Uuid::new_v4()),
            Cursor::new(b"this is not a png".to_vec()),
            CreateOptions::default(),
        )
        .await
        .unwrap_err();

    match err {
        AppError::Metadata { mime_type, .. } => assert_eq!(mime_type, "image/png"),
        other => panic!("expected metadata error, got {other:?}"),
    }
    assert!(env.repository.is_empty().await);
    assert!(!env.storage_root_has_files().await);
    assert!(env.scheduler.scheduled().is_empty());
}

#[tokio::test]
async fn test_failing_extractor_cleans_up() {
    let env = setup_with_extractor(Arc::new(FailingExtractor)).await;

    let err = env
        .store
        .create(
            &descriptor("logo", "image/png", Uuid::new_v4()),
            Cursor::new(gradient_png(10, 10)),
            CreateOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Metadata { .. }));
    assert!(env.repository.is_empty().await);
    assert!(!env.storage_root_has_files().await);
}

#[tokio::test]
async fn test_extraction_timeout_cleans_up() {
    let env = setup_with_extractor(Arc::new(SlowExtractor(Duration::from_secs(5)))).await;

    let err = env
        .store
        .create(
            &descriptor("logo", "image/png", Uuid::new_v4()),
            Cursor::new(gradient_png(10, 10)),
            CreateOptions {
                extraction_timeout: Some(Duration::from_millis(50)),
            },
        )
        .await
        .unwrap_err();

    match err {
        AppError::Metadata { mime_type, message } => {
            assert_eq!(mime_type, "image/png");
            assert!(message.contains("timed out"));
        }
        other => panic!("expected metadata error, got {other:?}"),
    }
    assert!(env.repository.is_empty().await);
}

#[tokio::test]
async fn test_storage_failure_removes_record() {
    let env = setup_test_env().await;
    env.storage.fail_uploads();

    let err = env
        .store
        .create(
            &descriptor("logo", "image/png", Uuid::new_v4()),
            Cursor::new(gradient_png(10, 10)),
            CreateOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Storage(_)));
    assert!(env.repository.is_empty().await);
}

#[tokio::test]
async fn test_lookup_by_short_and_internal_id() {
    let env = setup_test_env().await;
    let file = env.upload_png("logo", 20, 10, Uuid::new_v4()).await;

    assert_eq!(env.store.get(&file.id).await.unwrap(), file);
    assert_eq!(env.store.get_by_internal_id(file.internal_id).await.unwrap(), file);

    let err = env.store.get("nope").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_reprocess_reschedules() {
    let env = setup_test_env().await;
    let file = env.upload_png("logo", 20, 10, Uuid::new_v4()).await;

    env.store.reprocess(&file.id).await.unwrap();
    assert_eq!(env.scheduler.count_for(file.internal_id), 2);
}

#[tokio::test]
async fn test_remove_deletes_every_artifact() {
    let env = setup_test_env().await;
    let file = env.upload_png("backglass", 40, 30, Uuid::new_v4()).await;
    env.storage
        .copy(&env.original_key(&file), &env.backup_key(&file))
        .await
        .unwrap();
    env.processor.process(file.internal_id).await.unwrap();
    let file = env.reload(&file).await;
    assert_eq!(file.storage_paths.len(), 6);

    env.store.remove(&file).await.unwrap();

    for key in file.storage_paths.values() {
        assert!(!env.storage.exists(key).await.unwrap(), "{key} still exists");
    }
    assert!(!env.storage.exists(&env.backup_key(&file)).await.unwrap());
    assert!(env.repository.get(file.internal_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_remove_tolerates_failing_deletes() {
    let env = setup_test_env().await;
    let file = env.upload_png("logo", 40, 30, Uuid::new_v4()).await;
    let original = env
        .store
        .get_path(&file, None, PathOptions::default())
        .unwrap();
    env.storage.fail_deletes_containing(original.clone());

    env.store.remove(&file).await.unwrap();

    assert!(env.storage.exists(&original).await.unwrap());
    assert!(env.repository.get(file.internal_id).await.unwrap().is_none());
}

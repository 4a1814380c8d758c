//! Directory listing, uploads and recursive deletion.

use std::fs;
use std::sync::Arc;

use depot_core::{DepotError, StoreError};
use depot_storage::{
    ObjectAcl, ObjectStoreBackend, ObjectStoreClient, PutObjectRequest, StorageAdapter,
};
use depot_test_utils::assertions::*;
use depot_test_utils::fixtures::{mock_adapter, mock_adapter_with, test_config, TEST_BUCKET};
use depot_test_utils::{MockObjectStore, MockOperation};

// ============================================================================
// LISTING
// ============================================================================

#[tokio::test]
async fn list_sub_directories_returns_child_names() {
    let (store, adapter) = mock_adapter();
    store.insert("components/foo/1.0.0/package.json", "{}");
    store.insert("components/foo/1.1.0/package.json", "{}");
    store.insert("components/bar/2.0.0/package.json", "{}");
    store.insert("components/components.json", "{}");

    let names = adapter.list_sub_directories("components/").await.unwrap();
    assert_eq!(names, vec!["bar", "foo"]);

    // Missing trailing delimiter is added.
    let names = adapter.list_sub_directories("components/foo").await.unwrap();
    assert_eq!(names, vec!["1.0.0", "1.1.0"]);
}

#[tokio::test]
async fn list_sub_directories_without_children_is_dir_not_found() {
    let (store, adapter) = mock_adapter();
    store.insert("components/components.json", "{}");

    assert_dir_not_found(
        &adapter.list_sub_directories("components/").await,
        "components/",
    );
    assert_dir_not_found(&adapter.list_sub_directories("nothing").await, "nothing");
}

#[tokio::test]
async fn list_sub_directories_on_empty_dir_is_dir_not_found() {
    // "" lists under "/", and no storable key starts with a delimiter.
    let (store, adapter) = mock_adapter();
    store.insert("weird/key", "");

    assert_dir_not_found(&adapter.list_sub_directories("").await, "");
}

/// The in-memory `object_store` backend and the mock, seeded alike.
async fn both_adapters(keys: &[&str]) -> Vec<(&'static str, StorageAdapter)> {
    let backend = ObjectStoreBackend::in_memory(TEST_BUCKET);
    let store = MockObjectStore::new(TEST_BUCKET);
    for key in keys {
        backend
            .put_object(PutObjectRequest::new(*key, "x", ObjectAcl::PublicRead))
            .await
            .unwrap();
        store.insert(*key, "x");
    }
    vec![
        ("backend", StorageAdapter::new(Arc::new(backend), &test_config())),
        ("mock", StorageAdapter::new(Arc::new(store), &test_config())),
    ]
}

#[tokio::test]
async fn backend_and_mock_agree_on_prefixes() {
    let keys = [
        "components/foo/1.0.0/a.js",
        "components/foobar/1.0.0/b.js",
        "components/bar/1.0.0/c.js",
    ];
    for (name, adapter) in both_adapters(&keys).await {
        let names = adapter.list_sub_directories("components").await.unwrap();
        assert_eq!(names, vec!["bar", "foo", "foobar"], "{}", name);
        assert_dir_not_found(&adapter.list_sub_directories("").await, "");

        let deleted = adapter.delete_directory("components/fo").await.unwrap();
        assert_eq!(deleted, 2, "{}", name);
        let names = adapter.list_sub_directories("components/").await.unwrap();
        assert_eq!(names, vec!["bar"], "{}", name);
    }
}

#[tokio::test]
async fn backend_and_mock_refuse_keys_with_empty_segments() {
    for (name, adapter) in both_adapters(&[]).await {
        let result = adapter.put_file_content("x", "/weird/x.js", false).await;
        assert!(
            matches!(result, Err(DepotError::Store(StoreError::InvalidKey { .. }))),
            "{}: {:?}",
            name,
            result
        );
    }
}

#[tokio::test]
async fn list_errors_propagate() {
    let (store, adapter) = mock_adapter();
    store.fail(
        MockOperation::List,
        StoreError::Request {
            operation: "list_objects",
            key: "components/".to_string(),
            reason: "throttled".to_string(),
        },
    );
    assert_store_error(&adapter.list_sub_directories("components/").await);
}

// ============================================================================
// UPLOADS
// ============================================================================

#[tokio::test]
async fn put_file_content_sets_metadata() {
    let (store, adapter) = mock_adapter();

    adapter
        .put_file_content("body", "components/hello/1.0.0/app.js.gz", false)
        .await
        .unwrap();
    adapter
        .put_file_content("secret", "components/hello/1.0.0/server.js", true)
        .await
        .unwrap();
    adapter
        .put_file_content("blob", "components/hello/1.0.0/LICENSE", false)
        .await
        .unwrap();

    let gz = store.object("components/hello/1.0.0/app.js.gz").unwrap();
    assert_eq!(gz.acl, ObjectAcl::PublicRead);
    assert_eq!(gz.content_type.as_deref(), Some("application/javascript"));
    assert_eq!(gz.content_encoding.as_deref(), Some("gzip"));
    let expires = gz.expires.unwrap();
    assert!(expires > chrono::Utc::now() + chrono::Duration::days(360));

    let private = store.object("components/hello/1.0.0/server.js").unwrap();
    assert_eq!(private.acl, ObjectAcl::AuthenticatedRead);
    assert!(private.content_encoding.is_none());

    let unknown = store.object("components/hello/1.0.0/LICENSE").unwrap();
    assert!(unknown.content_type.is_none());
}

#[tokio::test]
async fn put_dir_uploads_tree_and_marks_server_private() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("static/img")).unwrap();
    fs::write(root.join("server.js"), "module.exports = {}").unwrap();
    fs::write(root.join("template.js.gz"), "gzipped").unwrap();
    fs::write(root.join("package.json"), r#"{"name":"hello"}"#).unwrap();
    fs::write(root.join("static/img/logo.png"), "png").unwrap();
    fs::write(root.join("static/server.js"), "not the entrypoint").unwrap();

    let (store, adapter) = mock_adapter();
    let uploaded = adapter
        .put_dir(root, "components/hello/1.0.0")
        .await
        .unwrap();

    assert_eq!(uploaded, 5);
    assert_eq!(
        store.keys(),
        vec![
            "components/hello/1.0.0/package.json",
            "components/hello/1.0.0/server.js",
            "components/hello/1.0.0/static/img/logo.png",
            "components/hello/1.0.0/static/server.js",
            "components/hello/1.0.0/template.js.gz",
        ]
    );

    let server = store.object("components/hello/1.0.0/server.js").unwrap();
    assert_eq!(server.acl, ObjectAcl::AuthenticatedRead);
    let nested = store.object("components/hello/1.0.0/static/server.js").unwrap();
    assert_eq!(nested.acl, ObjectAcl::PublicRead);

    let template = store.object("components/hello/1.0.0/template.js.gz").unwrap();
    assert_eq!(template.content_encoding.as_deref(), Some("gzip"));
    assert_eq!(
        store.text("components/hello/1.0.0/package.json").as_deref(),
        Some(r#"{"name":"hello"}"#)
    );
}

#[tokio::test]
async fn put_dir_collects_every_failure() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.js", "b.js", "c.js"] {
        fs::write(dir.path().join(name), name).unwrap();
    }

    let (store, adapter) = mock_adapter();
    store.fail(
        MockOperation::Put,
        StoreError::Request {
            operation: "put_object",
            key: "components".to_string(),
            reason: "denied".to_string(),
        },
    );

    match adapter.put_dir(dir.path(), "components/x/1.0.0").await {
        Err(DepotError::Upload { failures }) => {
            assert_eq!(failures.len(), 3);
            assert!(failures.iter().all(|f| matches!(f, DepotError::Store(_))));
        }
        other => panic!("Expected Upload error, got: {:?}", other),
    }
    assert_eq!(store.calls(MockOperation::Put), 3);
}

#[tokio::test]
async fn put_dir_missing_input_is_io_error() {
    let (_, adapter) = mock_adapter();
    let result = adapter
        .put_dir("/definitely/not/a/real/dir", "components/x/1.0.0")
        .await;
    assert!(matches!(result, Err(DepotError::Io { .. })));
}

// ============================================================================
// DELETION
// ============================================================================

#[tokio::test]
async fn delete_directory_pages_through_truncated_listings() {
    let store = MockObjectStore::new(TEST_BUCKET).with_page_size(2);
    for i in 0..5 {
        store.insert(format!("components/hello/1.0.0/file{}.js", i), "x");
    }
    store.insert("components/hello/2.0.0/keep.js", "x");
    store.insert("components/other/1.0.0/keep.js", "x");
    let (store, adapter) = mock_adapter_with(store, &test_config());

    let deleted = adapter
        .delete_directory("components/hello/1.0.0/")
        .await
        .unwrap();

    assert_eq!(deleted, 5);
    assert_eq!(store.delete_batches(), vec![2, 2, 1]);
    assert_eq!(store.calls(MockOperation::ListV2), 3);
    assert_eq!(
        store.keys(),
        vec![
            "components/hello/2.0.0/keep.js",
            "components/other/1.0.0/keep.js",
        ]
    );
}

#[tokio::test]
async fn delete_directory_on_empty_prefix_deletes_nothing() {
    let (store, adapter) = mock_adapter();
    store.insert("components/other/1.0.0/keep.js", "x");

    assert_eq!(adapter.delete_directory("components/gone/").await.unwrap(), 0);
    assert_eq!(store.calls(MockOperation::Delete), 0);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn delete_directory_propagates_errors() {
    let (store, adapter) = mock_adapter();
    store.insert("components/hello/1.0.0/a.js", "x");
    store.fail(
        MockOperation::Delete,
        StoreError::Request {
            operation: "delete_objects",
            key: TEST_BUCKET.to_string(),
            reason: "denied".to_string(),
        },
    );

    assert_store_error(&adapter.delete_directory("components/hello/").await);
    assert_eq!(store.len(), 1);
}

//! Storage tests

use super::*;
use crate::error::Error;
use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

async fn memory_client(files: &[(&str, &str)]) -> ObjectStoreClient {
    let store = Arc::new(InMemory::new());
    for (path, content) in files {
        store
            .put(
                &ObjectPath::from(*path),
                PutPayload::from(Bytes::from(content.to_string())),
            )
            .await
            .unwrap();
    }
    ObjectStoreClient::new(store)
}

// ============================================================================
// URL Parsing Tests
// ============================================================================

#[test]
fn test_parse_memory_url() {
    let client = ObjectStoreClient::parse("memory://").unwrap();
    assert_eq!(client.scheme(), "memory");
    assert!(!client.is_cloud());
    assert_eq!(client.prefix(), None);
}

#[test]
fn test_parse_local_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_string_lossy().to_string();

    let client = ObjectStoreClient::parse(&path).unwrap();
    assert_eq!(client.scheme(), "file");
    assert!(!client.is_cloud());

    let client = ObjectStoreClient::parse(&format!("file://{path}")).unwrap();
    assert_eq!(client.scheme(), "file");
}

#[test]
fn test_parse_missing_local_directory() {
    let result = ObjectStoreClient::parse("/definitely/not/a/real/dir/for/tests");
    assert!(matches!(result, Err(Error::Config { .. })));
}

#[test]
fn test_parse_missing_bucket() {
    let result = ObjectStoreClient::parse("s3:///prefix");
    assert!(matches!(result, Err(Error::Config { .. })));

    let result = ObjectStoreClient::parse("gs://");
    assert!(matches!(result, Err(Error::Config { .. })));
}

#[test]
fn test_with_prefix_trims_slashes() {
    let client = ObjectStoreClient::new(Arc::new(InMemory::new())).with_prefix("/data/raw/");
    assert_eq!(client.prefix(), Some("data/raw"));

    let client = ObjectStoreClient::new(Arc::new(InMemory::new())).with_prefix("/");
    assert_eq!(client.prefix(), None);
}

// ============================================================================
// Listing Tests
// ============================================================================

#[tokio::test]
async fn test_list_all_objects() {
    let client = memory_client(&[
        ("data/a.csv", "id\n1\n"),
        ("data/b.jsonl", "{}\n"),
        ("other/c.csv", "id\n2\n"),
    ])
    .await;

    let mut paths: Vec<_> = client
        .list(None)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();
    paths.sort();

    assert_eq!(paths, vec!["data/a.csv", "data/b.jsonl", "other/c.csv"]);
}

#[tokio::test]
async fn test_list_with_prefix() {
    let client = memory_client(&[("data/a.csv", "x"), ("other/c.csv", "y")]).await;

    let entries = client.list(Some("data")).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "data/a.csv");
    assert_eq!(entries[0].size, 1);
    assert!(entries[0].last_modified.is_some());
}

#[tokio::test]
async fn test_list_uses_client_prefix() {
    let client = memory_client(&[("data/a.csv", "x"), ("other/c.csv", "y")])
        .await
        .with_prefix("other/");

    let entries = client.list(None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "other/c.csv");
}

#[tokio::test]
async fn test_list_empty_store() {
    let client = memory_client(&[]).await;
    assert!(client.list(None).await.unwrap().is_empty());
}

// ============================================================================
// Read Tests
// ============================================================================

#[tokio::test]
async fn test_open_reads_full_content() {
    let client = memory_client(&[("data/a.csv", "id,name\n1,Alice\n")]).await;

    let mut reader = client.open("data/a.csv").await.unwrap();
    let mut content = String::new();
    reader.read_to_string(&mut content).await.unwrap();

    assert_eq!(content, "id,name\n1,Alice\n");
}

#[tokio::test]
async fn test_open_missing_object() {
    let client = memory_client(&[]).await;

    let result = client.open("data/missing.csv").await;
    match result {
        Err(Error::Storage { path, .. }) => assert_eq!(path, "data/missing.csv"),
        Err(other) => panic!("expected storage error, got {other:?}"),
        Ok(_) => panic!("expected storage error"),
    }
}

#[tokio::test]
async fn test_local_filesystem_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("logs")).unwrap();
    std::fs::write(dir.path().join("logs/a.jsonl"), "{\"a\":1}\n").unwrap();

    let client = ObjectStoreClient::parse(&dir.path().to_string_lossy()).unwrap();
    let entries = client.list(None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "logs/a.jsonl");

    let mut reader = client.open("logs/a.jsonl").await.unwrap();
    let mut content = String::new();
    reader.read_to_string(&mut content).await.unwrap();
    assert_eq!(content, "{\"a\":1}\n");
}

#[test]
fn test_object_entry_builder() {
    let now = chrono::Utc::now();
    let entry = ObjectEntry::new("a.csv").with_last_modified(now);
    assert_eq!(entry.path, "a.csv");
    assert_eq!(entry.last_modified, Some(now));
}

// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the artifact store against mock S3 endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use retrace_core::RetraceError;
use retrace_core::traits::ObjectStore;
use retrace_core::types::ArtifactKind;
use retrace_storage::{Database, StorageEndpoint, queries::endpoints};
use retrace_store::{ArtifactStore, EndpointResolver, SecretResolver};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StaticSecrets(HashMap<String, String>);

#[async_trait]
impl SecretResolver for StaticSecrets {
    async fn resolve(&self, secret_ref: &str) -> Result<String, RetraceError> {
        self.0
            .get(secret_ref)
            .cloned()
            .ok_or_else(|| RetraceError::Config(format!("unknown secret {secret_ref}")))
    }
}

fn endpoint_row(id: &str, url: &str, priority: i64, shadow: bool) -> StorageEndpoint {
    StorageEndpoint {
        id: id.to_string(),
        project_id: Some("p1".to_string()),
        endpoint_url: url.to_string(),
        bucket: "retrace".to_string(),
        region: "us-east-1".to_string(),
        access_key_id: "AKIATEST".to_string(),
        secret_ref: format!("secret-{id}"),
        public_url: None,
        priority,
        active: true,
        shadow,
    }
}

async fn store_with(
    rows: Vec<StorageEndpoint>,
) -> (ArtifactStore, Database, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("retrace.db")).await.unwrap();
    let mut secrets = HashMap::new();
    for row in &rows {
        secrets.insert(row.secret_ref.clone(), "secret".to_string());
        endpoints::insert_endpoint(&db, row).await.unwrap();
    }
    let resolver = Arc::new(EndpointResolver::new(
        db.clone(),
        Arc::new(StaticSecrets(secrets)),
    ));
    (ArtifactStore::new(resolver), db, dir)
}

#[tokio::test]
async fn upload_receipt_pins_downloads_to_the_writing_endpoint() {
    let server_a = MockServer::start().await;
    let server_b = MockServer::start().await;

    // Only endpoint A holds the object; B 404s everything.
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server_a)
        .await;
    Mock::given(method("GET"))
        .and(path("/retrace/tenant/t1/project/p1/sessions/s1/events/b.json"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .mount(&server_a)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server_b)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server_b)
        .await;

    // A is the only primary; B exists but would 404 if ever consulted.
    let (store, _db, _dir) = store_with(vec![
        endpoint_row("ep-a", &server_a.uri(), 1, false),
    ])
    .await;

    let key = "tenant/t1/project/p1/sessions/s1/events/b.json";
    let receipt = store.upload("p1", key, b"payload".to_vec()).await.unwrap();
    assert_eq!(receipt.endpoint_id, "ep-a");
    assert_eq!(receipt.size_bytes, 7);

    let body = store
        .download("p1", Some(&receipt.endpoint_id), key)
        .await
        .unwrap();
    assert_eq!(body, b"payload");
}

#[tokio::test]
async fn pinned_download_reaches_inactive_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"old".to_vec()))
        .mount(&server)
        .await;

    let mut drained = endpoint_row("ep-old", &server.uri(), 0, false);
    drained.active = false;
    let (store, _db, _dir) = store_with(vec![drained]).await;

    // The endpoint is out of the write pool, but a pinned read still works.
    let body = store
        .download("p1", Some("ep-old"), "tenant/t1/x.json")
        .await
        .unwrap();
    assert_eq!(body, b"old");
}

#[tokio::test]
async fn purge_respects_the_kind_guard() {
    let server = MockServer::start().await;
    let listing = "<ListBucketResult><IsTruncated>false</IsTruncated>\
        <Contents><Key>tenant/t1/project/p1/sessions/s1/events/a.json</Key></Contents>\
        <Contents><Key>tenant/t1/project/p1/sessions/s1/screenshots/seg-1.bin</Key></Contents>\
        <Contents><Key>tenant/t1/project/p1/sessions/s1/screenshots/notes.txt</Key></Contents>\
        </ListBucketResult>";
    Mock::given(method("GET"))
        .and(path("/retrace"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex("^/retrace$"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<DeleteResult></DeleteResult>"))
        .expect(1)
        .mount(&server)
        .await;

    let (store, _db, _dir) = store_with(vec![endpoint_row("ep-a", &server.uri(), 0, false)]).await;

    // Only the binary segment passes the guard: the events batch is a
    // foreign kind, and the stray .txt fails the extension check.
    let deleted = store
        .purge_prefix(
            "p1",
            "tenant/t1/project/p1/sessions/s1/",
            Some(ArtifactKind::Screenshots),
        )
        .await
        .unwrap();
    assert_eq!(deleted, 1);
}

#[tokio::test]
async fn unguarded_purge_erases_everything_under_the_prefix() {
    let server = MockServer::start().await;
    let listing = "<ListBucketResult><IsTruncated>false</IsTruncated>\
        <Contents><Key>tenant/t1/project/p1/sessions/s1/events/a.json</Key></Contents>\
        <Contents><Key>tenant/t1/project/p1/sessions/s1/screenshots/seg-1.bin</Key></Contents>\
        </ListBucketResult>";
    Mock::given(method("GET"))
        .and(path("/retrace"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<DeleteResult></DeleteResult>"))
        .mount(&server)
        .await;

    let (store, _db, _dir) = store_with(vec![endpoint_row("ep-a", &server.uri(), 0, false)]).await;
    let deleted = store
        .purge_prefix("p1", "tenant/t1/project/p1/sessions/s1/", None)
        .await
        .unwrap();
    assert_eq!(deleted, 2);
}

#[tokio::test]
async fn missing_endpoint_row_is_a_terminal_error() {
    let (store, _db, _dir) = store_with(vec![]).await;
    let err = store
        .download("p1", Some("ep-gone"), "tenant/t1/x.json")
        .await
        .unwrap_err();
    assert!(matches!(err, RetraceError::MissingDependency { .. }));
    assert!(!err.is_transient());
}

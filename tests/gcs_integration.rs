//! Integration tests for the Cloud Storage backend using wiremock
//!
//! These drive the public provider surface against a mocked JSON API:
//! open/read, create (including the conflict path), mkdir markers, paged
//! listings, delete, and custom metadata.

use gcpio::{ConfigRegistry, GcpConfig, Locator, ObjectMeta, StorageHandle};
use serde_json::json;
use wiremock::matchers::{bearer_token, body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_configs(endpoint: &str) -> ConfigRegistry {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let mut configs = ConfigRegistry::new();
    configs.register(
        "gs",
        GcpConfig::new()
            .with_project_id("test-project")
            .with_access_token("test-token")
            .with_endpoint(endpoint),
    );
    configs
}

async fn read_all(handle: &mut Box<dyn StorageHandle>) -> Vec<u8> {
    let mut content = Vec::new();
    let mut buf = [0u8; 7]; // deliberately small to exercise chunked reads
    loop {
        let n = handle.read(&mut buf).await.expect("read should succeed");
        if n == 0 {
            break;
        }
        content.extend_from_slice(&buf[..n]);
    }
    content
}

async fn collect(handle: &dyn StorageHandle) -> Vec<ObjectMeta> {
    let mut lister = handle.list().await.expect("list should start");
    let mut entries = Vec::new();
    while let Some(entry) = lister.next().await.expect("listing page should succeed") {
        entries.push(entry);
    }
    entries
}

#[tokio::test]
async fn open_reads_object_content_lazily() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o/data.bin"))
        .and(query_param("alt", "media"))
        .and(bearer_token("test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello streaming world".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let providers = gcpio::defaults(test_configs(&server.uri()));
    let locator = Locator::parse("gs:///my-bucket/data.bin").unwrap();

    let mut handle = providers.storage("gs").unwrap().open(&locator).await.unwrap();
    // Open is lazy: the download only happens on the first read.
    assert_eq!(server.received_requests().await.unwrap().len(), 0);

    let content = read_all(&mut handle).await;
    assert_eq!(content, b"hello streaming world");
    handle.close().await.unwrap();
}

#[tokio::test]
async fn create_fails_when_object_exists() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o/existing.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "existing.txt",
            "size": "3"
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The existing object must stay untouched.
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/my-bucket/o"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let providers = gcpio::defaults(test_configs(&server.uri()));
    let locator = Locator::parse("gs:///my-bucket/existing.txt").unwrap();

    let err = providers
        .storage("gs")
        .unwrap()
        .create(&locator)
        .await
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, gcpio::Error::AlreadyExists(_)));
}

#[tokio::test]
async fn create_writes_zero_length_object() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o/new.txt"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "Not Found"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/my-bucket/o"))
        .and(query_param("uploadType", "media"))
        .and(query_param("name", "new.txt"))
        .and(body_string(""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "new.txt"})))
        .expect(1)
        .mount(&server)
        .await;

    let providers = gcpio::defaults(test_configs(&server.uri()));
    let locator = Locator::parse("gs:///my-bucket/new.txt").unwrap();

    providers
        .storage("gs")
        .unwrap()
        .create(&locator)
        .await
        .expect("create should succeed");
}

#[tokio::test]
async fn bucket_creation_is_refused() {
    let server = MockServer::start().await;
    let providers = gcpio::defaults(test_configs(&server.uri()));
    let locator = Locator::parse("gs://my-bucket").unwrap();

    let err = providers
        .storage("gs")
        .unwrap()
        .create(&locator)
        .await
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, gcpio::Error::Unsupported(_)));
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn writes_are_buffered_and_committed_on_close() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/my-bucket/o"))
        .and(query_param("uploadType", "media"))
        .and(query_param("name", "notes.txt"))
        .and(body_string("hello world"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "notes.txt"})))
        .expect(1)
        .mount(&server)
        .await;

    let providers = gcpio::defaults(test_configs(&server.uri()));
    let locator = Locator::parse("gs:///my-bucket/notes.txt").unwrap();

    let mut handle = providers.storage("gs").unwrap().open(&locator).await.unwrap();
    assert_eq!(handle.write(b"hello ").await.unwrap(), 6);
    assert_eq!(handle.write(b"world").await.unwrap(), 5);
    // Nothing is on the wire until close commits the buffered content.
    assert_eq!(server.received_requests().await.unwrap().len(), 0);

    handle.close().await.expect("close should commit the upload");
}

#[tokio::test]
async fn mkdir_creates_slash_suffixed_marker() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o/archive%2F"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "Not Found"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/my-bucket/o"))
        .and(query_param("name", "archive/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "archive/"})))
        .expect(1)
        .mount(&server)
        .await;

    let providers = gcpio::defaults(test_configs(&server.uri()));
    let locator = Locator::parse("gs:///my-bucket/archive").unwrap();

    providers
        .storage("gs")
        .unwrap()
        .mkdir(&locator)
        .await
        .expect("mkdir should create the marker");
}

#[tokio::test]
async fn mkdir_conflict_when_marker_exists() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o/archive%2F"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "archive/"})))
        .expect(1)
        .mount(&server)
        .await;

    let providers = gcpio::defaults(test_configs(&server.uri()));
    let locator = Locator::parse("gs:///my-bucket/archive").unwrap();

    let err = providers
        .storage("gs")
        .unwrap()
        .mkdir_all(&locator)
        .await
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, gcpio::Error::AlreadyExists(_)));
}

#[tokio::test]
async fn listing_pages_and_skips_the_self_marker() {
    let server = MockServer::start().await;

    // Second page, requested with the continuation token. Mounted first so
    // the token-less mock below doesn't shadow it.
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o"))
        .and(query_param("prefix", "logs/"))
        .and(query_param("pageToken", "tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"name": "logs/b.txt", "size": "9"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o"))
        .and(query_param("prefix", "logs/"))
        .and(query_param("delimiter", "/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"name": "logs/", "size": "0"},
                {"name": "logs/a.txt", "size": "5", "updated": "2026-08-01T00:00:00Z"}
            ],
            "prefixes": ["logs/2026/"],
            "nextPageToken": "tok1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let providers = gcpio::defaults(test_configs(&server.uri()));
    let locator = Locator::parse("gs:///my-bucket/logs/").unwrap();

    let handle = providers.storage("gs").unwrap().open(&locator).await.unwrap();
    let entries = collect(handle.as_ref()).await;

    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["logs/a.txt", "logs/2026/", "logs/b.txt"]);

    assert!(!entries[0].is_dir);
    assert_eq!(entries[0].size, 5);
    assert!(entries[0].updated.is_some());
    assert!(entries[1].is_dir, "listing prefixes are directory entries");
}

#[tokio::test]
async fn delete_removes_the_object() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/storage/v1/b/my-bucket/o/old.txt"))
        .and(bearer_token("test-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let providers = gcpio::defaults(test_configs(&server.uri()));
    let locator = Locator::parse("gs:///my-bucket/old.txt").unwrap();

    let handle = providers.storage("gs").unwrap().open(&locator).await.unwrap();
    handle.delete().await.expect("delete should succeed");
}

#[tokio::test]
async fn custom_metadata_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o/tagged.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "tagged.txt",
            "metadata": {"owner": "data-eng"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/storage/v1/b/my-bucket/o/tagged.txt"))
        .and(wiremock::matchers::body_json(json!({
            "metadata": {"owner": "data-eng", "stage": "raw"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "tagged.txt"})))
        .expect(1)
        .mount(&server)
        .await;

    let providers = gcpio::defaults(test_configs(&server.uri()));
    let locator = Locator::parse("gs:///my-bucket/tagged.txt").unwrap();
    let handle = providers.storage("gs").unwrap().open(&locator).await.unwrap();

    assert_eq!(
        handle.property("owner").await.unwrap().as_deref(),
        Some("data-eng")
    );
    assert_eq!(handle.property("missing").await.unwrap(), None);

    handle
        .set_property("stage", "raw")
        .await
        .expect("metadata patch should succeed");
}

#[tokio::test]
async fn host_hint_selects_a_different_account() {
    // Two accounts, two configurations: the scheme default points at one
    // server, the host-hinted configuration at another.
    let default_server = MockServer::start().await;
    let acct1_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/shared-bucket/o/report.csv"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"acct1 data".to_vec()))
        .expect(1)
        .mount(&acct1_server)
        .await;

    let mut configs = test_configs(&default_server.uri());
    configs.register(
        "acct1",
        GcpConfig::new()
            .with_project_id("acct1-project")
            .with_access_token("test-token")
            .with_endpoint(acct1_server.uri()),
    );

    let providers = gcpio::defaults(configs);
    let locator = Locator::parse("gs://acct1/shared-bucket/report.csv").unwrap();

    let mut handle = providers.storage("gs").unwrap().open(&locator).await.unwrap();
    assert_eq!(read_all(&mut handle).await, b"acct1 data");
    assert_eq!(
        default_server.received_requests().await.unwrap().len(),
        0,
        "the scheme-default account must not be touched"
    );
}

#[tokio::test]
async fn quota_project_and_user_agent_reach_the_wire() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o/data.bin"))
        .and(wiremock::matchers::header(
            "x-goog-user-project",
            "billing-project",
        ))
        .and(wiremock::matchers::header("user-agent", "etl-worker/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "data.bin",
            "size": "1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut configs = ConfigRegistry::new();
    configs.register(
        "gs",
        GcpConfig::new()
            .with_project_id("test-project")
            .with_access_token("test-token")
            .with_endpoint(server.uri())
            .with_user_agent("etl-worker/3")
            .with_quota_project("billing-project"),
    );

    let providers = gcpio::defaults(configs);
    let locator = Locator::parse("gs:///my-bucket/data.bin").unwrap();
    let handle = providers.storage("gs").unwrap().open(&locator).await.unwrap();
    handle.metadata().await.expect("metadata should succeed");
}

#[tokio::test]
async fn metadata_translates_api_attributes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o/data.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "data.bin",
            "size": "2048",
            "updated": "2026-08-01T12:30:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let providers = gcpio::defaults(test_configs(&server.uri()));
    let locator = Locator::parse("gs:///my-bucket/data.bin").unwrap();
    let handle = providers.storage("gs").unwrap().open(&locator).await.unwrap();

    let meta = handle.metadata().await.unwrap();
    assert_eq!(meta.name, "data.bin");
    assert_eq!(meta.size, 2048);
    assert!(!meta.is_dir);
    assert!(meta.updated.is_some());
}

//! Integration tests for the Config Engine's get/publish/delete operations
//! against a mocked v1 config-service wire API.

use batata_client::{ClientProfile, ConfigKey, ServerEndpoint};
use batata_client::{ConfigEngine, HttpDispatcher, MetricsMonitor};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn endpoint_for(mock: &MockServer) -> ServerEndpoint {
    let stripped = mock.uri().replace("http://", "");
    let (host, port) = stripped.split_once(':').unwrap();
    ServerEndpoint::new(host, port.parse().unwrap()).with_context_path("")
}

fn engine_for(mock: &MockServer, cache_dir: impl Into<std::path::PathBuf>) -> std::sync::Arc<ConfigEngine> {
    let dispatcher = HttpDispatcher::new(vec![endpoint_for(mock)]).unwrap();
    let metrics = std::sync::Arc::new(MetricsMonitor::new().unwrap());
    let profile = ClientProfile::builder().cache_dir(cache_dir).build();
    ConfigEngine::new(dispatcher, profile, metrics)
}

#[tokio::test]
async fn test_get_config_all_rejected_returns_error_no_cache() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/cs/configs"))
        .respond_with(ResponseTemplate::new(401).set_body_string("no access"))
        .mount(&mock)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let engine = engine_for(&mock, dir.path());
    let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP");

    let err = engine.get_config(&key).await.unwrap_err();
    assert!(matches!(
        err,
        batata_client::ClientError::ServerRejected { status: 401, .. }
    ));
}

#[tokio::test]
async fn test_get_config_success_then_outage_serves_cache() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/cs/configs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("version-one"))
        .up_to_n_times(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/cs/configs"))
        .respond_with(ResponseTemplate::new(401).set_body_string("no access"))
        .mount(&mock)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let engine = engine_for(&mock, dir.path());
    let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP");

    let first = engine.get_config(&key).await.unwrap();
    assert_eq!(first, "version-one");

    // Server now rejects every call; the disk cache written on the first
    // successful GET must be served instead of surfacing the error.
    let second = engine.get_config(&key).await.unwrap();
    assert_eq!(second, "version-one");
}

#[tokio::test]
async fn test_get_config_404_is_empty_not_error() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/cs/configs"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let engine = engine_for(&mock, dir.path());
    let key = ConfigKey::new("missing.yaml", "DEFAULT_GROUP");

    let content = engine.get_config(&key).await.unwrap();
    assert_eq!(content, "");
}

#[tokio::test]
async fn test_publish_config_true_body_succeeds() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/cs/configs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("true"))
        .mount(&mock)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let engine = engine_for(&mock, dir.path());
    let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP");

    let ok = engine.publish_config(&key, "a=1").await.unwrap();
    assert!(ok);
}

#[tokio::test]
async fn test_publish_config_false_body_is_not_an_error() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/cs/configs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("false"))
        .mount(&mock)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let engine = engine_for(&mock, dir.path());
    let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP");

    let ok = engine.publish_config(&key, "a=1").await.unwrap();
    assert!(!ok);
}

#[tokio::test]
async fn test_delete_config_removes_cached_content() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/cs/configs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("true"))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/cs/configs"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/cs/configs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("true"))
        .mount(&mock)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let engine = engine_for(&mock, dir.path());
    let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP");

    engine.publish_config(&key, "a=1").await.unwrap();
    assert!(engine.delete_config(&key).await.unwrap());

    // The cache entry is gone, so a now-failing GET has nothing to fall
    // back to.
    let err = engine.get_config(&key).await.unwrap_err();
    assert!(matches!(
        err,
        batata_client::ClientError::ServerRejected { status: 401, .. }
    ));
}

#[tokio::test]
async fn test_get_config_with_tenant_sends_tenant_param() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/cs/configs"))
        .and(wiremock::matchers::query_param("tenant", "tenant-a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("scoped-content"))
        .mount(&mock)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let engine = engine_for(&mock, dir.path());
    let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP").with_tenant("tenant-a");

    let content = engine.get_config(&key).await.unwrap();
    assert_eq!(content, "scoped-content");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_config_outage_without_prior_success_propagates_error() {
    // Nothing bound to this address; the dispatcher's own retries exhaust
    // against a real connection-refused error rather than a wiremock 5xx.
    let servers = vec![ServerEndpoint::new("127.0.0.1", 1).with_context_path("")];
    let dispatcher = HttpDispatcher::new(servers).unwrap();
    let metrics = std::sync::Arc::new(MetricsMonitor::new().unwrap());
    let dir = tempfile::tempdir().unwrap();
    let profile = ClientProfile::builder()
        .cache_dir(dir.path())
        .timeout_ms(500)
        .build();
    let engine = ConfigEngine::new(dispatcher, profile, metrics);

    let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP");
    let err = engine.get_config(&key).await.unwrap_err();
    assert!(matches!(err, batata_client::ClientError::TransportFailure(_)));
}

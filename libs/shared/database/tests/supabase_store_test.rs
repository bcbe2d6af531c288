use std::time::Duration;

use assert_matches::assert_matches;
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_database::{DocumentStore, Fields, StoreError, SupabaseStore};
use shared_models::auth::{Identity, SignInMethod};

fn store_for(server: &MockServer) -> SupabaseStore {
    let mut config = AppConfig::new(server.uri(), "test-anon-key");
    config.snapshot_poll_interval_ms = 20;
    SupabaseStore::new(&config)
}

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn test_add_returns_store_assigned_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(header("apikey", "test-anon-key"))
        .and(header("Prefer", "return=representation"))
        .and(body_json(json!({"name": "Ana Silva", "cpf": "111"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"id": "p-1", "name": "Ana Silva", "cpf": "111"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let id = store
        .add("patients", fields(json!({"name": "Ana Silva", "cpf": "111"})))
        .await
        .unwrap();

    assert_eq!(id, "p-1");
}

#[tokio::test]
async fn test_requests_carry_session_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(header("Authorization", "Bearer session-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    store.authorize(&Identity::new(
        "user-1",
        Some("session-token".to_string()),
        SignInMethod::Anonymous,
    ));

    let docs = store.list("appointments").await.unwrap();
    assert!(docs.is_empty());
}

#[tokio::test]
async fn test_find_equal_builds_point_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("cpf", "eq.111"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "p-1", "name": "Ana Silva", "cpf": "111"}
        ])))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let found = store.find_equal("patients", "cpf", &json!("111")).await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "p-1");
    assert_eq!(found[0].field("name"), Some(&json!("Ana Silva")));
}

#[tokio::test]
async fn test_update_patches_by_id() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", "eq.p-1"))
        .and(body_json(json!({"isArchived": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "p-1", "isArchived": true}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    store
        .update("patients", "p-1", fields(json!({"isArchived": true})))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_of_missing_row_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let result = store.update("patients", "ghost", Fields::new()).await;

    assert_matches!(result, Err(StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_permission_errors_are_typed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let result = store.list("patients").await;

    assert_matches!(result, Err(StoreError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_subscription_emits_initial_snapshot_then_errors_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "p-1", "name": "Ana Silva"}
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let mut stream = store.subscribe("patients");

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.len(), 1);

    assert_matches!(stream.next().await, Some(Err(StoreError::PermissionDenied(_))));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_subscription_suppresses_unchanged_snapshots() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a-1", "time": "09:00"}
        ])))
        .up_to_n_times(3)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a-1", "time": "09:00"},
            {"id": "a-2", "time": "10:00"}
        ])))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let mut stream = store.subscribe("appointments");

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.len(), 1);

    // The two identical polls in between are swallowed.
    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second.len(), 2);
}

#[tokio::test]
async fn test_write_between_reads_triggers_next_snapshot() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "p-1", "name": "Ana Silva"}
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "p-1", "name": "Ana Silva"},
            {"id": "p-2", "name": "Bruno"}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"id": "p-2", "name": "Bruno"}
        ])))
        .mount(&server)
        .await;

    let mut config = AppConfig::new(server.uri(), "test-anon-key");
    config.snapshot_poll_interval_ms = 60_000;
    let store = SupabaseStore::new(&config);
    let mut stream = store.subscribe("patients");

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.len(), 1);

    // The stream is idle while the write lands.
    store.add("patients", fields(json!({"name": "Bruno"}))).await.unwrap();

    let second = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("write did not wake the subscription")
        .unwrap()
        .unwrap();
    assert_eq!(second.len(), 2);
}

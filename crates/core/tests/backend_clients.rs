//! Contract tests for the hosted-backend clients.
//!
//! ## Endpoints Tested
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | GET    | `/rest/v1/tourists` | `fetch_*` |
//! | POST   | `/auth/v1/admin/users` | `create_*` |
//! | GET    | `/auth/v1/admin/users/{id}` | `get_*` |
//! | GET    | `/auth/v1/admin/users` | `find_by_email_*` |
//! | PUT    | `/auth/v1/admin/users/{id}` | `update_*` |

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use travelsafe_core::config::{AppConfig, FallbackLookup};
use travelsafe_core::errors::{IdentityError, StoreError};
use travelsafe_core::identity::{
    AccountMetadata, AccountUpdate, AdminIdentityService, IdentityService, NewAccount,
};
use travelsafe_core::models::ProvisionAction;
use travelsafe_core::store::{RestTouristStore, TouristStore};
use travelsafe_core::{BackendClient, Provisioner};

fn test_config(mock_server: &MockServer) -> AppConfig {
    let mut config = AppConfig::for_backend(mock_server.uri());
    config.backend.service_role_key = Some("service-key".into());
    config.backend.request_timeout_secs = 5;
    config
}

fn test_client(mock_server: &MockServer) -> BackendClient {
    BackendClient::new(&test_config(mock_server).backend).unwrap()
}

fn new_account() -> NewAccount {
    NewAccount {
        email: "john.smith@travelsafe.com".into(),
        password: "American2024!".into(),
        email_confirm: true,
        user_metadata: AccountMetadata {
            tourist_id: "TS001".into(),
            name: "John Smith".into(),
        },
    }
}

// ── GET /rest/v1/tourists ────────────────────────────────────────────

#[tokio::test]
async fn fetch_sends_select_and_auth_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/tourists"))
        .and(query_param("select", "tourist_id,name,citizenship"))
        .and(header("apikey", "service-key"))
        .and(header("authorization", "Bearer service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"tourist_id": "TS001", "name": "John Smith", "citizenship": "American"},
            {"tourist_id": "TS002", "name": "Priya Patel", "citizenship": "Indian"}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = RestTouristStore::new(test_client(&mock_server), "tourists");
    let records = store.fetch_tourists().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].name, "Priya Patel");
}

#[tokio::test]
async fn fetch_surfaces_api_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/tourists"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "42P01",
            "details": null,
            "hint": null,
            "message": "relation \"public.tourists\" does not exist"
        })))
        .mount(&mock_server)
        .await;

    let store = RestTouristStore::new(test_client(&mock_server), "tourists");
    let err = store.fetch_tourists().await.unwrap_err();
    assert!(matches!(err, StoreError::Api { status: 404, .. }));
    assert_eq!(err.to_string(), "relation \"public.tourists\" does not exist");
}

#[tokio::test]
async fn fetch_rejects_malformed_rows() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/tourists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"tourist_id": "TS001"}])))
        .mount(&mock_server)
        .await;

    let store = RestTouristStore::new(test_client(&mock_server), "tourists");
    assert!(matches!(
        store.fetch_tourists().await,
        Err(StoreError::Parse(_))
    ));
}

// ── POST /auth/v1/admin/users ────────────────────────────────────────

#[tokio::test]
async fn create_posts_confirmed_account_with_metadata() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/admin/users"))
        .and(body_partial_json(json!({
            "email": "john.smith@travelsafe.com",
            "password": "American2024!",
            "email_confirm": true,
            "user_metadata": {"tourist_id": "TS001", "name": "John Smith"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "8d0fd2b3-0000-4000-8000-000000000001",
            "email": "john.smith@travelsafe.com",
            "user_metadata": {"tourist_id": "TS001", "name": "John Smith"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let svc = AdminIdentityService::new(test_client(&mock_server));
    let account = svc.create_account(&new_account()).await.unwrap();
    assert_eq!(account.id, "8d0fd2b3-0000-4000-8000-000000000001");
}

#[tokio::test]
async fn create_classifies_duplicate_email() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/admin/users"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "code": 422,
            "error_code": "email_exists",
            "msg": "A user with this email address has already been registered"
        })))
        .mount(&mock_server)
        .await;

    let svc = AdminIdentityService::new(test_client(&mock_server));
    let err = svc.create_account(&new_account()).await.unwrap_err();
    assert!(matches!(err, IdentityError::AlreadyRegistered(_)));
}

#[tokio::test]
async fn create_reports_other_rejections() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/admin/users"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": 403,
            "error_code": "not_admin",
            "msg": "User not allowed"
        })))
        .mount(&mock_server)
        .await;

    let svc = AdminIdentityService::new(test_client(&mock_server));
    let err = svc.create_account(&new_account()).await.unwrap_err();
    assert!(matches!(err, IdentityError::Api { status: 403, .. }));
    assert_eq!(err.to_string(), "User not allowed");
}

#[tokio::test]
async fn create_with_malformed_body_is_unexpected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&mock_server)
        .await;

    let svc = AdminIdentityService::new(test_client(&mock_server));
    let err = svc.create_account(&new_account()).await.unwrap_err();
    assert!(matches!(err, IdentityError::Parse(_)));
    assert!(err.is_unexpected());
}

// ── GET /auth/v1/admin/users/{id} ────────────────────────────────────

#[tokio::test]
async fn get_missing_account_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/admin/users/TS001"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 404,
            "error_code": "user_not_found",
            "msg": "User not found"
        })))
        .mount(&mock_server)
        .await;

    let svc = AdminIdentityService::new(test_client(&mock_server));
    let err = svc.get_account("TS001").await.unwrap_err();
    assert!(matches!(err, IdentityError::NotFound(ref id) if id == "TS001"));
}

#[tokio::test]
async fn get_escapes_reserved_characters_in_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/admin/users/VICTIM"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "VICTIM"})))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/admin/users/other%2F..%2FVICTIM"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 404,
            "error_code": "user_not_found",
            "msg": "User not found"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let svc = AdminIdentityService::new(test_client(&mock_server));

    let err = svc.get_account("VICTIM#1").await.unwrap_err();
    assert!(matches!(err, IdentityError::NotFound(ref id) if id == "VICTIM#1"));

    let err = svc.get_account("other/../VICTIM").await.unwrap_err();
    assert!(matches!(err, IdentityError::NotFound(_)));

    let update = AccountUpdate {
        password: "American2024!".into(),
        email_confirm: true,
    };
    assert!(svc.update_account("VICTIM?x=1", &update).await.is_err());
}

// ── GET /auth/v1/admin/users?page= ───────────────────────────────────

#[tokio::test]
async fn find_by_email_scans_listing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/admin/users"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "aud": "authenticated",
            "users": [
                {"id": "u-1", "email": "priya.patel@travelsafe.com"},
                {"id": "u-2", "email": "John.Smith@travelsafe.com"}
            ]
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let svc = AdminIdentityService::new(test_client(&mock_server));
    let account = svc
        .find_account_by_email("john.smith@travelsafe.com")
        .await
        .unwrap();
    assert_eq!(account.id, "u-2");

    let err = svc
        .find_account_by_email("nobody@travelsafe.com")
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::NotFound(_)));
}

// ── PUT /auth/v1/admin/users/{id} ────────────────────────────────────

#[tokio::test]
async fn update_sends_password_and_confirmation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/auth/v1/admin/users/u-2"))
        .and(body_partial_json(json!({
            "password": "American2024!",
            "email_confirm": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u-2",
            "email": "john.smith@travelsafe.com"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let svc = AdminIdentityService::new(test_client(&mock_server));
    let update = AccountUpdate {
        password: "American2024!".into(),
        email_confirm: true,
    };
    let account = svc.update_account("u-2", &update).await.unwrap();
    assert_eq!(account.id, "u-2");
}

// ── Full run over HTTP ───────────────────────────────────────────────

#[tokio::test]
async fn provisioner_over_http_falls_back_to_update() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/tourists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"tourist_id": "TS001", "name": "John Smith", "citizenship": "American"}
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/admin/users"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "code": 422,
            "msg": "User already registered"
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/admin/users/TS001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "TS001"})))
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/auth/v1/admin/users/TS001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "TS001"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server);
    config.provisioning.fallback_lookup = FallbackLookup::TouristId;
    let provisioner = Provisioner::from_config(&config).unwrap();

    let report = provisioner.run().await.unwrap();
    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].success);
    assert_eq!(report.results[0].action, Some(ProvisionAction::Updated));
    assert_eq!(report.results[0].user_id.as_deref(), Some("TS001"));
}

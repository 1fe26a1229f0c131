mod common;

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::test;
use async_trait::async_trait;
use backend::build_state;
use backend_test_support::problem_details::assert_problem;
use common::{app_for, empty_postgres, pg_env, provisioned_postgres, TestBackend};
use db_infra::config::{ConfigFile, DatabaseConfig, Dialect, EnvVars};
use db_infra::testing::MockConnector;
use db_infra::{Connector, Stage};
use sea_orm::{DatabaseConnection, DbErr};
use serde_json::{json, Value};
use tokio::sync::Semaphore;

/// Holds every connect until the test adds a permit.
struct GatedConnector {
    gate: Semaphore,
    inner: MockConnector,
}

#[async_trait]
impl Connector for GatedConnector {
    async fn connect(&self, cfg: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| DbErr::Custom(e.to_string()))?;
        self.inner.connect(cfg).await
    }
}

#[actix_web::test]
async fn status_reports_camel_case_shape_without_touching_the_database() {
    let backend = TestBackend::new(pg_env(), MockConnector::empty());
    let app = backend.app().await;

    let req = test::TestRequest::get().uri("/api/bootstrap/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
    for key in [
        "running",
        "ready",
        "stage",
        "message",
        "error",
        "errorCode",
        "steps",
        "lastAttemptAt",
    ] {
        assert!(keys.contains(&key), "missing {key} in {body}");
    }
    assert_eq!(body["stage"], "Idle");
    assert_eq!(body["ready"], false);
    assert_eq!(backend.connector.connect_calls(), 0);
}

#[actix_web::test]
async fn retry_responds_after_the_run_completes() {
    let backend = TestBackend::new(pg_env(), MockConnector::with_connection(empty_postgres()));
    let app = backend.app().await;

    let req = test::TestRequest::post().uri("/api/bootstrap/retry").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;

    assert_eq!(body["stage"], "Ready", "{body}");
    assert_eq!(body["ready"], true);
    assert_eq!(body["running"], false);
    assert!(body["error"].is_null());
    let messages: Vec<&str> = body["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["message"].as_str().unwrap())
        .collect();
    assert_eq!(messages.first(), Some(&"resolving database configuration"));
    assert_eq!(messages.last(), Some(&"database ready"));
    assert!(messages.contains(&"applying schema"));
}

#[actix_web::test]
async fn abandoned_retry_request_does_not_cancel_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let connector = Arc::new(GatedConnector {
        gate: Semaphore::new(0),
        inner: MockConnector::with_connection(empty_postgres()),
    });
    let state = build_state()
        .with_env(pg_env())
        .with_config_file(dir.path().join("config.json"))
        .with_connector(connector.clone())
        .build()
        .unwrap();
    let app = app_for(&state).await;

    let req = test::TestRequest::post().uri("/api/bootstrap/retry").to_request();
    let gave_up = tokio::time::timeout(Duration::from_millis(20), test::call_service(&app, req)).await;
    assert!(gave_up.is_err(), "the run is gated and cannot have finished");

    connector.gate.add_permits(1);
    for _ in 0..200 {
        if !state.bootstrap.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let status = state.bootstrap.status();
    assert_eq!(status.stage, Stage::Ready, "{:?}", status.error);
    assert!(status.steps.iter().all(|s| !s.message.contains("aborted")));
}

#[actix_web::test]
async fn retry_after_failure_starts_a_fresh_step_log() {
    let connector = MockConnector::with_connection(provisioned_postgres(Vec::new()));
    connector.reject_password("pw");
    let backend = TestBackend::new(pg_env(), connector);

    let failed = backend.state.bootstrap.run().await;
    assert!(failed.error.is_some());
    let app = backend.app().await;

    let req = test::TestRequest::post().uri("/api/bootstrap/retry").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["stage"], "Error");
    assert_eq!(body["errorCode"], "bootstrap_failed");
    assert_eq!(body["steps"].as_array().unwrap().len(), failed.steps.len());
    assert_eq!(backend.connector.connect_calls(), 2);
}

#[actix_web::test]
async fn setup_writes_config_file_and_bootstraps() {
    let backend = TestBackend::new(
        EnvVars::empty(),
        MockConnector::with_connection(provisioned_postgres(Vec::new())),
    );
    let app = backend.app().await;

    let req = test::TestRequest::post()
        .uri("/api/bootstrap/setup")
        .set_json(json!({
            "db": {
                "dialect": "postgres",
                "host": "db.internal",
                "user": "app",
                "password": "s3cret",
                "database": "gabinete",
                "useTLS": true
            },
            "push": { "publicKey": "pub", "privateKey": "priv" }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["stage"], "Ready", "{body}");

    let written = ConfigFile::load(&backend.config_path()).unwrap().unwrap();
    let db = written.db.unwrap();
    assert_eq!(db.dialect, Dialect::Postgres);
    assert_eq!(db.password, "s3cret");
    assert!(db.use_tls);
    assert_eq!(written.push.unwrap().public_key, "pub");

    let req = test::TestRequest::post()
        .uri("/api/bootstrap/setup")
        .set_json(json!({
            "db": { "dialect": "mysql", "host": "h", "user": "u", "database": "d" }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_problem(resp, StatusCode::CONFLICT, "ALREADY_CONFIGURED").await;
}

#[actix_web::test]
async fn setup_rejects_incomplete_database_config() {
    let backend = TestBackend::new(EnvVars::empty(), MockConnector::empty());
    let app = backend.app().await;

    let req = test::TestRequest::post()
        .uri("/api/bootstrap/setup")
        .set_json(json!({
            "db": { "dialect": "postgres", "host": " ", "user": "app", "database": "gabinete" }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    let problem = assert_problem(resp, StatusCode::BAD_REQUEST, "INVALID_SETUP").await;
    assert!(problem.detail.contains("host"));
    assert!(!backend.config_path().exists());
    assert_eq!(backend.connector.connect_calls(), 0);
}

#[actix_web::test]
async fn setup_rejects_malformed_json() {
    let backend = TestBackend::new(EnvVars::empty(), MockConnector::empty());
    let app = backend.app().await;

    let req = test::TestRequest::post()
        .uri("/api/bootstrap/setup")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"db\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_problem(resp, StatusCode::BAD_REQUEST, "INVALID_SETUP").await;
}

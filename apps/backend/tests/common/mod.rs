#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{test, web, App, Error};
use backend::{build_state, routes, AppState, RequestTrace, StructuredLogger, TraceSpan};
use db_infra::config::{Dialect, EnvVars};
use db_infra::infra::db::schema::split_statements;
use db_infra::testing::MockConnector;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult, Value};
use tempfile::TempDir;

#[ctor::ctor]
fn init_logging() {
    backend_test_support::logging::init();
}

/// App state wired to a mock connector and a config file inside a temp dir.
pub struct TestBackend {
    pub state: AppState,
    pub connector: Arc<MockConnector>,
    dir: TempDir,
}

impl TestBackend {
    pub fn new(env: EnvVars, connector: MockConnector) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let connector = Arc::new(connector);
        let state = build_state()
            .with_env(env)
            .with_config_file(dir.path().join("config.json"))
            .with_connector(connector.clone())
            .build()
            .expect("build app state");
        Self {
            state,
            connector,
            dir,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.json")
    }

    pub async fn app(
        &self,
    ) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = Error> {
        app_for(&self.state).await
    }
}

/// The production middleware stack and routes around `state`.
pub async fn app_for(
    state: &AppState,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = Error> {
    test::init_service(
        App::new()
            .wrap(StructuredLogger)
            .wrap(TraceSpan)
            .wrap(RequestTrace)
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure),
    )
    .await
}

pub fn pg_env() -> EnvVars {
    EnvVars::from_pairs([
        ("POSTGRES_HOST", "db.internal"),
        ("POSTGRES_USER", "app"),
        ("POSTGRES_PASSWORD", "pw"),
        ("POSTGRES_DATABASE", "gabinete"),
    ])
}

pub fn count_rows(column: &'static str, n: i64) -> Vec<BTreeMap<&'static str, Value>> {
    vec![BTreeMap::from([(column, Value::BigInt(Some(n)))])]
}

fn ok_exec() -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected: 1,
    }
}

/// A Postgres database that already has the schema and one user, followed
/// by `extra` scripted query results for whatever runs after bootstrap. The
/// idempotent schema pass still runs every statement.
pub fn provisioned_postgres(
    extra: Vec<Vec<BTreeMap<&'static str, Value>>>,
) -> DatabaseConnection {
    let schema_statements = split_statements(Dialect::Postgres.schema_source()).len();
    let mut results = vec![count_rows("ok", 1), count_rows("cnt", 1), count_rows("cnt", 1)];
    results.extend(extra);
    MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(results)
        .append_exec_results((0..schema_statements).map(|_| ok_exec()))
        .into_connection()
}

/// A Postgres database with nothing in it: bootstrap applies every schema
/// statement and inserts the privileged account.
pub fn empty_postgres() -> DatabaseConnection {
    let schema_statements = split_statements(Dialect::Postgres.schema_source()).len();
    MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([count_rows("ok", 1), count_rows("cnt", 0), count_rows("cnt", 0)])
        .append_exec_results((0..schema_statements + 2).map(|_| ok_exec()))
        .into_connection()
}

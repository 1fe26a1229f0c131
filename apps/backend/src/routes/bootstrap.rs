//! Bootstrap status, retry and one-time setup. Exempt from the readiness
//! gate; none of these handlers queries the database directly.

use actix_web::{web, HttpResponse};
use db_infra::config::{ConfigFile, DatabaseConfig, PushCredentials};
use db_infra::BootstrapState;
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::state::app_state::AppState;

async fn status(app_state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(app_state.bootstrap.status())
}

/// Run a retry on its own task and wait for it. A client that disconnects
/// drops only the wait, never the run.
async fn detached_retry(app_state: &AppState) -> Result<BootstrapState, AppError> {
    app_state
        .bootstrap
        .spawn_retry()
        .await
        .map_err(|e| AppError::internal(format!("bootstrap task failed: {e}")))
}

/// Responds after the run finishes. While a run is in flight the current
/// status comes back unchanged.
async fn retry(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let state = detached_retry(&app_state).await?;
    Ok(HttpResponse::Ok().json(state))
}

#[derive(Debug, Deserialize)]
pub struct SetupRequest {
    pub db: DatabaseConfig,
    #[serde(default)]
    pub push: Option<PushCredentials>,
}

/// Persist the config file wholesale, then retry.
async fn setup(
    app_state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let request: SetupRequest = serde_json::from_slice(&body).map_err(|e| {
        AppError::bad_request("INVALID_SETUP", format!("Invalid setup payload: {e}"))
    })?;
    request
        .db
        .validate()
        .map_err(|e| AppError::bad_request("INVALID_SETUP", e.to_string()))?;

    let bootstrap = &app_state.bootstrap;
    if bootstrap.is_ready() {
        return Err(AppError::conflict(
            "ALREADY_CONFIGURED",
            "The database is already configured and ready".to_string(),
        ));
    }
    if bootstrap.is_running() {
        return Err(AppError::conflict(
            "BOOTSTRAP_IN_PROGRESS",
            "A bootstrap run is in progress; wait for it to finish".to_string(),
        ));
    }

    let path = bootstrap.resolver().config_file().to_path_buf();
    info!(path = %path.display(), target = %request.db.describe(), "setup_config=writing");
    let file = ConfigFile {
        db: Some(request.db),
        push: request.push,
    };
    web::block(move || file.write(&path))
        .await
        .map_err(|e| AppError::internal(format!("config write task failed: {e}")))??;

    let state = detached_retry(&app_state).await?;
    Ok(HttpResponse::Ok().json(state))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/status", web::get().to(status))
        .route("/retry", web::post().to(retry))
        .route("/setup", web::post().to(setup));
}

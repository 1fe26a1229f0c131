use actix_web::error::ResponseError;
use actix_web::http::header;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use db_infra::{BootstrapState, DbInfraError};
use serde::Serialize;
use thiserror::Error;

use crate::trace_ctx;

/// Seconds a client should wait before polling again while bootstrap runs.
pub const RETRY_AFTER_SECS: u32 = 5;

#[derive(Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub code: String,
    pub trace_id: String,
    /// Readiness tag, present only on not-ready responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BootstrapState>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database not ready")]
    NotReady { bootstrap: Box<BootstrapState> },
    #[error("Setup required")]
    SetupRequired { bootstrap: Box<BootstrapState> },
    #[error("Database error: {detail}")]
    Db { detail: String },
    #[error("Bad request: {detail}")]
    BadRequest { code: &'static str, detail: String },
    #[error("Internal error: {detail}")]
    Internal { detail: String },
    #[error("Conflict: {detail}")]
    Conflict { code: &'static str, detail: String },
    #[error("Database unavailable: {detail}")]
    DbUnavailable { detail: String },
}

impl AppError {
    fn code(&self) -> String {
        match self {
            AppError::NotReady { .. } => "BOOTSTRAP_NOT_READY".to_string(),
            AppError::SetupRequired { .. } => "SETUP_REQUIRED".to_string(),
            AppError::Db { .. } => "DB_ERROR".to_string(),
            AppError::BadRequest { code, .. } => code.to_string(),
            AppError::Internal { .. } => "INTERNAL".to_string(),
            AppError::Conflict { code, .. } => code.to_string(),
            AppError::DbUnavailable { .. } => "DB_UNAVAILABLE".to_string(),
        }
    }

    fn detail(&self) -> String {
        match self {
            AppError::NotReady { bootstrap } => match &bootstrap.error {
                Some(error) => format!("Database bootstrap failed: {error}"),
                None => format!("Database is not ready yet ({})", bootstrap.stage),
            },
            AppError::SetupRequired { .. } => {
                "No database configuration found; complete setup and retry".to_string()
            }
            AppError::Db { detail } => detail.clone(),
            AppError::BadRequest { detail, .. } => detail.clone(),
            AppError::Internal { detail } => detail.clone(),
            AppError::Conflict { detail, .. } => detail.clone(),
            AppError::DbUnavailable { detail } => detail.clone(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::SetupRequired { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Db { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::DbUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Machine-readable readiness tag for not-ready responses.
    fn readiness_tag(&self) -> Option<&'static str> {
        match self {
            AppError::NotReady { .. } => Some(db_infra::NotReady::Bootstrapping.tag()),
            AppError::SetupRequired { .. } => Some(db_infra::NotReady::SetupRequired.tag()),
            _ => None,
        }
    }

    fn bootstrap_snapshot(&self) -> Option<BootstrapState> {
        match self {
            AppError::NotReady { bootstrap } | AppError::SetupRequired { bootstrap } => {
                Some((**bootstrap).clone())
            }
            _ => None,
        }
    }

    pub fn not_ready(reason: db_infra::NotReady, bootstrap: BootstrapState) -> Self {
        let bootstrap = Box::new(bootstrap);
        match reason {
            db_infra::NotReady::SetupRequired => Self::SetupRequired { bootstrap },
            db_infra::NotReady::Bootstrapping => Self::NotReady { bootstrap },
        }
    }

    pub fn internal(detail: String) -> Self {
        Self::Internal { detail }
    }

    pub fn bad_request(code: &'static str, detail: String) -> Self {
        Self::BadRequest { code, detail }
    }

    pub fn db(detail: String) -> Self {
        Self::Db { detail }
    }

    pub fn conflict(code: &'static str, detail: String) -> Self {
        Self::Conflict { code, detail }
    }

    pub fn db_unavailable(detail: String) -> Self {
        Self::DbUnavailable { detail }
    }

    fn humanize_code(code: &str) -> String {
        code.split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    None => String::new(),
                    Some(first) => first
                        .to_uppercase()
                        .chain(chars.flat_map(char::to_lowercase))
                        .collect(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<DbInfraError> for AppError {
    fn from(e: DbInfraError) -> Self {
        match e {
            DbInfraError::NotInitialized => AppError::db_unavailable(e.to_string()),
            DbInfraError::Query { message } => AppError::db(message),
            other => AppError::internal(other.to_string()),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status();
        let code = self.code();
        let detail = self.detail();
        let trace_id = trace_ctx::trace_id();

        let problem_details = ProblemDetails {
            type_: format!("https://gabinete.app/errors/{}", code.to_uppercase()),
            title: Self::humanize_code(&code),
            status: status.as_u16(),
            detail,
            code,
            trace_id: trace_id.clone(),
            error: self.readiness_tag(),
            bootstrap: self.bootstrap_snapshot(),
        };

        let mut builder = HttpResponse::build(status);
        builder
            .content_type("application/problem+json")
            .insert_header(("x-trace-id", trace_id));
        if status == StatusCode::SERVICE_UNAVAILABLE {
            builder.insert_header((header::RETRY_AFTER, RETRY_AFTER_SECS.to_string()));
        }
        builder.json(problem_details)
    }
}

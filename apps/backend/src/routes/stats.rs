use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::error::AppError;
use crate::state::app_state::AppState;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub users: i64,
    pub posts: i64,
}

async fn stats(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let pool = app_state.pool();
    let users = pool
        .scalar_i64("SELECT COUNT(*) AS cnt FROM users WHERE active = ?", vec![true.into()], "cnt")
        .await?;
    let posts = pool
        .scalar_i64("SELECT COUNT(*) AS cnt FROM posts", Vec::new(), "cnt")
        .await?;
    Ok(HttpResponse::Ok().json(StatsResponse { users, posts }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/stats", web::get().to(stats));
}

use actix_web::web;

use crate::middleware::ReadinessGate;

pub mod bootstrap;
pub mod health;
pub mod stats;

/// Register every route.
///
/// `/api/bootstrap/*` is matched before the gated catch-all scope, so status,
/// retry and setup stay reachable while the database is not ready. Every
/// other `/api/*` path, including unknown ones, passes through
/// `ReadinessGate` first.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::configure_routes);

    cfg.service(
        web::scope("/api")
            .service(web::scope("/bootstrap").configure(bootstrap::configure_routes))
            .service(
                web::scope("")
                    .wrap(ReadinessGate)
                    .configure(stats::configure_routes),
            ),
    );
}

use actix_web::{web, App, HttpServer};
use backend::config::ServerConfig;
use backend::middleware::{RequestTrace, StructuredLogger, TraceSpan};
use backend::{routes, telemetry};
use db_infra::config::EnvVars;
use tracing::{error, info};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init_tracing();

    let env = EnvVars::from_process();
    let server = match ServerConfig::from_env(&env) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "server_config=invalid");
            std::process::exit(1);
        }
    };

    let app_state = match backend::build_state().with_env(env).build() {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "app_state=invalid");
            std::process::exit(1);
        }
    };

    // The server starts accepting requests immediately; `/api/*` answers 503
    // until the supervised bootstrap reaches Ready.
    let _supervisor = app_state.bootstrap.spawn_supervised();

    info!(host = %server.host, port = server.port, "server=starting");
    let data = web::Data::new(app_state);

    HttpServer::new(move || {
        App::new()
            .wrap(StructuredLogger)
            .wrap(TraceSpan)
            .wrap(RequestTrace)
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .bind((server.host.as_str(), server.port))?
    .run()
    .await
}

pub mod readiness_gate;
pub mod request_trace;
pub mod structured_logger;
pub mod trace_span;

pub use readiness_gate::ReadinessGate;
pub use request_trace::RequestTrace;
pub use structured_logger::StructuredLogger;
pub use trace_span::TraceSpan;

use actix_web::dev::ServiceRequest;
use actix_web::web;

use crate::state::app_state::AppState;

/// Current bootstrap stage for log fields, or `"unmounted"` when the app has
/// no `AppState`.
pub(crate) fn bootstrap_stage(req: &ServiceRequest) -> &'static str {
    req.app_data::<web::Data<AppState>>()
        .map(|state| state.bootstrap.status().stage.as_str())
        .unwrap_or("unmounted")
}

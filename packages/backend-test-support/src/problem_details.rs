//! Assertions for the backend's problem-details error contract, written
//! against the wire format so they do not depend on backend types.

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use actix_web::http::StatusCode;
use actix_web::test;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub code: String,
    pub trace_id: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub bootstrap: Option<Value>,
}

/// Check status, content type, and trace id parity between the `x-trace-id`
/// header and the body, then return the parsed body.
pub fn assert_problem_parts(
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
    expected_status: StatusCode,
    expected_code: &str,
) -> Problem {
    assert_eq!(status, expected_status);

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(
        content_type.starts_with("application/problem+json"),
        "expected application/problem+json, got {content_type:?}"
    );

    let problem: Problem = serde_json::from_slice(body).unwrap_or_else(|e| {
        panic!(
            "body is not problem details ({e}): {}",
            String::from_utf8_lossy(body)
        )
    });

    let header_trace = headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .expect("x-trace-id header should be present");
    assert_eq!(problem.trace_id, header_trace, "trace_id must match x-trace-id");
    assert_ne!(problem.trace_id, "unknown", "trace_id was rendered outside a request scope");

    assert_eq!(problem.code, expected_code);
    assert_eq!(problem.status, expected_status.as_u16());
    problem
}

pub async fn assert_problem<B: MessageBody>(
    resp: ServiceResponse<B>,
    expected_status: StatusCode,
    expected_code: &str,
) -> Problem {
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = test::read_body(resp).await;
    assert_problem_parts(status, &headers, &body, expected_status, expected_code)
}

/// A readiness refusal: 503 with `Retry-After`, the machine tag in `error`
/// and a bootstrap status snapshot.
pub async fn assert_not_ready<B: MessageBody>(resp: ServiceResponse<B>, expected_tag: &str) -> Problem {
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let expected_code = match expected_tag {
        "setup_required" => "SETUP_REQUIRED",
        _ => "BOOTSTRAP_NOT_READY",
    };

    let problem = assert_problem(resp, StatusCode::SERVICE_UNAVAILABLE, expected_code).await;

    assert!(
        retry_after.is_some_and(|v| !v.is_empty()),
        "503 responses must carry Retry-After"
    );
    assert_eq!(problem.error.as_deref(), Some(expected_tag));
    let snapshot = problem
        .bootstrap
        .as_ref()
        .expect("not-ready body should include the bootstrap snapshot");
    assert_eq!(snapshot["ready"], Value::Bool(false));
    problem
}

//! Shared helpers for backend tests: one-time logging setup and
//! problem-details assertions.

pub mod logging;
pub mod problem_details;

//! Refuses database-backed requests until bootstrap reaches `Ready`.
//!
//! Wrapped around the gated part of `/api`; the bootstrap routes are
//! registered outside it. A refused request never reaches its handler, so it
//! never touches the pool.

use std::future::{ready, Ready};

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, Error, ResponseError};
use db_infra::{BootstrapState, NotReady};
use futures_util::future::LocalBoxFuture;
use tracing::debug;

use crate::error::AppError;
use crate::state::app_state::AppState;

pub struct ReadinessGate;

impl<S, B> Transform<S, ServiceRequest> for ReadinessGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ReadinessGateMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ReadinessGateMiddleware { service }))
    }
}

pub struct ReadinessGateMiddleware<S> {
    service: S,
}

fn verdict(req: &ServiceRequest) -> Result<(), (NotReady, BootstrapState)> {
    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        return Err((NotReady::Bootstrapping, BootstrapState::default()));
    };
    state
        .bootstrap
        .check_ready()
        .map_err(|reason| (reason, state.bootstrap.status()))
}

impl<S, B> Service<ServiceRequest> for ReadinessGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match verdict(&req) {
            Ok(()) => {
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Err((reason, snapshot)) => {
                debug!(path = %req.path(), tag = reason.tag(), stage = %snapshot.stage, "readiness_gate=refused");
                // Rendered inside the future so the trace id scope is active.
                Box::pin(async move {
                    let response = AppError::not_ready(reason, snapshot).error_response();
                    let (http_req, _payload) = req.into_parts();
                    Ok(ServiceResponse::new(http_req, response).map_into_right_body())
                })
            }
        }
    }
}

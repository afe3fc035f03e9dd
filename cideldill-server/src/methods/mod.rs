mod call;
mod callable;
mod operator;
mod poll;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cideldill_proto::{endpoints::health::HealthResponse, errors::WireError};

use crate::{
    calls::CompleteError,
    context::Context,
    layers,
    store::AdmitError,
};

pub fn router(context: Arc<Context>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/call/start", post(call::start))
        .route("/api/call/complete", post(call::complete))
        .route("/api/poll/:call_id", get(poll::poll))
        .route("/api/callable/register", post(callable::register))
        .route(
            "/api/breakpoint",
            get(operator::list_breakpoints)
                .post(operator::add_breakpoint)
                .delete(operator::remove_breakpoint),
        )
        .route("/api/action/deliver", post(operator::deliver))
        .route("/api/calls", get(operator::list_calls))
        .layer(axum::middleware::from_fn(layers::logger::log_requests))
        .with_state(context)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// A protocol failure on its way out the door: the wire error body plus the
/// status code it rides on.
pub(crate) struct ApiError(StatusCode, WireError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

impl From<WireError> for ApiError {
    fn from(error: WireError) -> Self {
        let status = match &error {
            WireError::CidNotFound { .. }
            | WireError::CidMismatch
            | WireError::DuplicateCompletion
            | WireError::UnknownActionTarget => StatusCode::CONFLICT,
            WireError::UnknownCall => StatusCode::NOT_FOUND,
            WireError::Malformed { .. } => StatusCode::BAD_REQUEST,
        };

        Self(status, error)
    }
}

impl From<AdmitError> for ApiError {
    fn from(error: AdmitError) -> Self {
        match error {
            AdmitError::Mismatch { .. } => WireError::CidMismatch.into(),
            AdmitError::Missing { missing_cids } => WireError::CidNotFound { missing_cids }.into(),
        }
    }
}

impl From<CompleteError> for ApiError {
    fn from(error: CompleteError) -> Self {
        match error {
            CompleteError::Unknown => WireError::UnknownCall.into(),
            CompleteError::Duplicate => WireError::DuplicateCompletion.into(),
        }
    }
}

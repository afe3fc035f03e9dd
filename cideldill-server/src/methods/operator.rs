//! The surface the operator UI drives: breakpoint management, action
//! delivery, and the call-record listing.

use std::sync::Arc;

use axum::{extract::State, Json};
use cideldill_proto::{
    endpoints::operator::{
        BreakpointList, BreakpointRequest, CallList, DeliverRequest, DeliverResponse,
    },
    errors::WireError,
};
use tracing::info;

use crate::{context::Context, methods::ApiError};

pub async fn list_breakpoints(State(context): State<Arc<Context>>) -> Json<BreakpointList> {
    Json(BreakpointList {
        breakpoints: context.breakpoints.list(),
    })
}

pub async fn add_breakpoint(
    State(context): State<Arc<Context>>,
    Json(request): Json<BreakpointRequest>,
) -> Json<BreakpointList> {
    info!(breakpoint = ?request.breakpoint, "breakpoint set");
    context.breakpoints.add(request.breakpoint);

    Json(BreakpointList {
        breakpoints: context.breakpoints.list(),
    })
}

pub async fn remove_breakpoint(
    State(context): State<Arc<Context>>,
    Json(request): Json<BreakpointRequest>,
) -> Json<BreakpointList> {
    info!(breakpoint = ?request.breakpoint, "breakpoint cleared");
    context.breakpoints.remove(&request.breakpoint);

    Json(BreakpointList {
        breakpoints: context.breakpoints.list(),
    })
}

pub async fn deliver(
    State(context): State<Arc<Context>>,
    Json(request): Json<DeliverRequest>,
) -> Result<Json<DeliverResponse>, ApiError> {
    info!(call_id = %request.call_id, action = ?request.action, "operator delivered an action");

    context
        .pauses
        .deliver(&request.call_id, request.action)
        .map_err(|_| ApiError::from(WireError::UnknownActionTarget))?;

    Ok(Json(DeliverResponse {
        status: "ok".to_string(),
    }))
}

pub async fn list_calls(State(context): State<Arc<Context>>) -> Json<CallList> {
    Json(CallList {
        calls: context.calls.list(),
    })
}

use std::sync::Arc;

use axum::{extract::State, Json};
use cideldill_proto::{
    actions::Action,
    calls::CallStatus,
    endpoints::call::{
        CompleteRequest, CompleteResponse, CompletionStatus, StartRequest, StartResponse,
    },
};
use tracing::{debug, warn};

use crate::{calls::NewCall, context::Context, methods::ApiError};

pub async fn start(
    State(context): State<Arc<Context>>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    context.store.admit_all(
        std::iter::once(&request.target)
            .chain(request.args.iter())
            .chain(request.kwargs.values()),
    )?;

    let paused = context.breakpoints.pauses(&request.method_name);
    let break_on_exception = context.breakpoints.arms_on_exception();

    let call_id = context.calls.begin(NewCall {
        call_type: request.call_type,
        method_name: request.method_name.clone(),
        target_cid: request.target.cid.clone(),
        args: request.args.iter().map(|v| v.cid.clone()).collect(),
        kwargs: request
            .kwargs
            .iter()
            .map(|(k, v)| (k.clone(), v.cid.clone()))
            .collect(),
        call_site: request.call_site,
        break_on_exception,
    });

    let action = if paused {
        // rendezvous first, visible paused status second: anyone who sees
        // the paused record can deliver an action without racing us
        context.pauses.pause(call_id.clone());
        context.calls.set_status(&call_id, CallStatus::Paused);
        debug!(%call_id, method = %request.method_name, "paused awaiting an operator decision");

        Action::Poll {
            poll_url: format!("/api/poll/{call_id}"),
            interval_ms: context.poll.interval_ms,
            timeout_ms: context.poll.timeout_ms,
        }
    } else {
        Action::Continue
    };

    Ok(Json(StartResponse { call_id, action }))
}

pub async fn complete(
    State(context): State<Arc<Context>>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, ApiError> {
    context.store.admit_all(
        request
            .result
            .iter()
            .chain(request.exception.iter().filter_map(|e| e.data.as_ref())),
    )?;

    if request.status == CompletionStatus::Exception {
        if let Some(exception) = &request.exception {
            warn!(
                call_id = %request.call_id,
                kind = %exception.type_,
                message = %exception.message,
                "call completed with an exception",
            );
        }
    }

    let result_cid = request.result.map(|v| v.cid);

    let armed = context.calls.complete(
        &request.call_id,
        request.status,
        result_cid,
        request.exception,
    )?;

    // an armed on-exception rule holds the caller here for inspection; the
    // outcome is already recorded, only the return is delayed
    let followup = if armed && request.status == CompletionStatus::Exception {
        context.pauses.pause(request.call_id.clone());
        debug!(call_id = %request.call_id, "holding an exceptional completion for the operator");

        Some(Action::Poll {
            poll_url: format!("/api/poll/{}", request.call_id),
            interval_ms: context.poll.interval_ms,
            timeout_ms: context.poll.timeout_ms,
        })
    } else {
        None
    };

    Ok(Json(CompleteResponse {
        status: "ok".to_string(),
        followup,
    }))
}

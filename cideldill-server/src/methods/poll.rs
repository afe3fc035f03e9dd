use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    Json,
};
use cideldill_proto::{calls::CallId, endpoints::poll::PollResponse, errors::WireError};
use tracing::debug;

use crate::{context::Context, methods::ApiError, rendezvous::PollOutcome};

pub async fn poll(
    State(context): State<Arc<Context>>,
    Path(call_id): Path<String>,
) -> Result<Json<PollResponse>, ApiError> {
    let call_id = CallId::new(call_id);

    // hold the request open up to one interval so a decision that lands
    // mid-poll is returned without waiting for the client's next round
    let wait = Duration::from_millis(context.poll.interval_ms);

    match context.pauses.poll(&call_id, wait).await {
        None => Err(WireError::UnknownCall.into()),
        Some(PollOutcome::Waiting) => Ok(Json(PollResponse::Waiting)),
        Some(PollOutcome::Ready(action)) => {
            debug!(%call_id, ?action, "handing the operator's decision to the caller");
            context.calls.resume(&call_id);

            Ok(Json(PollResponse::Ready { action }))
        }
    }
}

use std::sync::Arc;

use axum::{extract::State, Json};
use cideldill_proto::{
    calls::RegisteredCallable,
    endpoints::callable::{RegisterRequest, RegisterResponse},
};
use tracing::debug;

use crate::context::Context;

pub async fn register(
    State(context): State<Arc<Context>>,
    Json(request): Json<RegisterRequest>,
) -> Json<RegisterResponse> {
    debug!(name = %request.name, signature = %request.signature, "callable registered");

    context.callables.register(RegisteredCallable {
        name: request.name,
        signature: request.signature,
        target_cid: request.target_cid,
    });

    Json(RegisterResponse {
        status: "ok".to_string(),
    })
}

//! Logs each and every request out in a format similar to that of Apache's
//! logs.

use std::time::Instant;

use axum::{http::Request, middleware::Next, response::Response};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

pub async fn log_requests<B>(request: Request<B>, next: Next<B>) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("inspector", "request_id" = request_id.to_string().as_str());

    let method = request.method().clone();
    let uri = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).instrument(span.clone()).await;

    let _enter = span.enter();
    if response.status().is_server_error() {
        error!(
            "\"{method} {uri}\" {status} {duration:?}",
            status = response.status().as_u16(),
            duration = start.elapsed(),
        );
    } else {
        info!(
            "\"{method} {uri}\" {status} {duration:?}",
            status = response.status().as_u16(),
            duration = start.elapsed(),
        );
    }

    response
}

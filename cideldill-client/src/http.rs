//! The two inspector clients: a blocking one for thread-based hosts and an
//! async twin that suspends through tokio instead of sleeping the thread.
//! Both speak the same protocol over the same CID cache.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use cideldill_proto::{
    actions::Action,
    cid::Cid,
    codec,
    endpoints::{
        call::{CompleteRequest, CompleteResponse, StartRequest, StartResponse},
        callable::{RegisterRequest, RegisterResponse},
        health::HealthResponse,
        poll::PollResponse,
    },
    errors::WireError,
    value::ValueRef,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;
use url::Url;

use crate::{cache::CidCache, errors::DebugError};

/// Decodes a value the server sent inside an action payload.
///
/// Action payloads always carry bytes; the CID cache only tracks the
/// outbound direction, so a byte-less value here is a protocol violation.
pub(crate) fn decode_value<T: DeserializeOwned>(value: &ValueRef) -> Result<T, DebugError> {
    let bytes = value.bytes.as_ref().ok_or_else(|| {
        DebugError::Protocol(format!("value {:?} arrived without bytes", value.cid))
    })?;

    Ok(codec::decode(bytes.as_bytes())?)
}

fn wire_form(cache: &CidCache, full: &ValueRef) -> ValueRef {
    if cache.holds(&full.cid) {
        full.bare()
    } else {
        full.clone()
    }
}

fn strip_start(cache: &CidCache, full: &StartRequest) -> StartRequest {
    StartRequest {
        call_type: full.call_type,
        method_name: full.method_name.clone(),
        signature: full.signature.clone(),
        target: wire_form(cache, &full.target),
        args: full.args.iter().map(|v| wire_form(cache, v)).collect(),
        kwargs: full
            .kwargs
            .iter()
            .map(|(k, v)| (k.clone(), wire_form(cache, v)))
            .collect(),
        call_site: full.call_site.clone(),
    }
}

fn strip_complete(cache: &CidCache, full: &CompleteRequest) -> CompleteRequest {
    let mut request = full.clone();

    request.result = full.result.as_ref().map(|v| wire_form(cache, v));
    if let Some(exception) = &mut request.exception {
        if let Some(data) = exception.data.take() {
            exception.data = Some(wire_form(cache, &data));
        }
    }

    request
}

fn start_cids(full: &StartRequest) -> Vec<Cid> {
    std::iter::once(&full.target)
        .chain(full.args.iter())
        .chain(full.kwargs.values())
        .map(|v| v.cid.clone())
        .collect()
}

fn complete_cids(full: &CompleteRequest) -> Vec<Cid> {
    full.result
        .iter()
        .chain(full.exception.iter().filter_map(|e| e.data.as_ref()))
        .map(|v| v.cid.clone())
        .collect()
}

fn note_accepted(cache: &CidCache, cids: Vec<Cid>) {
    for cid in cids {
        cache.insert(cid);
    }
}

fn note_missing(cache: &CidCache, missing: &[Cid]) {
    debug!(
        count = missing.len(),
        "server disclaimed cached content, resending with bytes"
    );

    for cid in missing {
        cache.evict(cid);
    }
}

fn unexpected(error: WireError) -> DebugError {
    DebugError::Protocol(format!("server rejected the request: {error:?}"))
}

/// Splits a response into "protocol-level answer" and "wire error the
/// protocol allows"; anything else is a local protocol violation.
fn parse_body<Resp: DeserializeOwned>(
    status: reqwest::StatusCode,
    url: &str,
    text: &str,
) -> Result<Result<Resp, WireError>, DebugError> {
    if status.is_success() {
        match serde_json::from_str(text) {
            Ok(value) => Ok(Ok(value)),
            Err(error) => Err(DebugError::Protocol(format!(
                "malformed response from {url}: {error}"
            ))),
        }
    } else {
        match serde_json::from_str::<WireError>(text) {
            Ok(wire) => Ok(Err(wire)),
            Err(_) => Err(DebugError::Protocol(format!(
                "unexpected status {status} from {url}: {text}"
            ))),
        }
    }
}

fn check_health(health: HealthResponse) -> Result<(), DebugError> {
    if health.status == "ok" {
        Ok(())
    } else {
        Err(DebugError::Protocol(format!(
            "unexpected health status {:?}",
            health.status
        )))
    }
}

pub(crate) struct InspectorClient {
    base: Url,
    cache: Arc<CidCache>,
    http: reqwest::blocking::Client,
}

impl InspectorClient {
    pub fn new(base: Url, cache: Arc<CidCache>) -> Result<Self, DebugError> {
        let http = reqwest::blocking::Client::builder()
            .build()
            .map_err(|source| DebugError::ServerUnreachable {
                url: base.to_string(),
                source,
            })?;

        Ok(Self { base, cache, http })
    }

    pub fn health(&self) -> Result<(), DebugError> {
        let url = self.endpoint("api/health")?;

        let response = self
            .http
            .get(url.clone())
            .send()
            .map_err(|source| DebugError::ServerUnreachable {
                url: url.to_string(),
                source,
            })?;

        match read_blocking(response)? {
            Ok(health) => check_health(health),
            Err(error) => Err(unexpected(error)),
        }
    }

    pub fn start(&self, full: &StartRequest) -> Result<StartResponse, DebugError> {
        for last_attempt in [false, true] {
            let body = strip_start(&self.cache, full);

            match self.post("api/call/start", &body)? {
                Ok(response) => {
                    note_accepted(&self.cache, start_cids(full));
                    return Ok(response);
                }
                Err(WireError::CidNotFound { missing_cids }) if !last_attempt => {
                    note_missing(&self.cache, &missing_cids);
                }
                Err(error) => return Err(unexpected(error)),
            }
        }

        Err(DebugError::Protocol(
            "server still missing content after a resend".to_string(),
        ))
    }

    pub fn complete(&self, full: &CompleteRequest) -> Result<CompleteResponse, DebugError> {
        for last_attempt in [false, true] {
            let body = strip_complete(&self.cache, full);

            match self.post("api/call/complete", &body)? {
                Ok(response) => {
                    note_accepted(&self.cache, complete_cids(full));
                    return Ok(response);
                }
                Err(WireError::CidNotFound { missing_cids }) if !last_attempt => {
                    note_missing(&self.cache, &missing_cids);
                }
                Err(error) => return Err(unexpected(error)),
            }
        }

        Err(DebugError::Protocol(
            "server still missing content after a resend".to_string(),
        ))
    }

    pub fn poll(&self, path: &str) -> Result<PollResponse, DebugError> {
        let url = self.endpoint(path)?;

        let response = self
            .http
            .get(url.clone())
            .send()
            .map_err(|source| DebugError::ServerUnreachable {
                url: url.to_string(),
                source,
            })?;

        match read_blocking(response)? {
            Ok(poll) => Ok(poll),
            Err(error) => Err(unexpected(error)),
        }
    }

    /// Runs the poll loop for a paused call: fetch, wait, repeat, up to
    /// the server-given total deadline.
    pub fn poll_until_ready(
        &self,
        path: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Action, DebugError> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.poll(path)? {
                PollResponse::Ready { action } => return Ok(action),
                PollResponse::Waiting => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(DebugError::PollTimeout(timeout));
                    }

                    std::thread::sleep(interval.min(deadline - now));
                }
            }
        }
    }

    pub fn register(&self, request: &RegisterRequest) -> Result<(), DebugError> {
        match self.post::<_, RegisterResponse>("api/callable/register", request)? {
            Ok(_) => Ok(()),
            Err(error) => Err(unexpected(error)),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, DebugError> {
        self.base
            .join(path)
            .map_err(|source| DebugError::InvalidUrl {
                url: format!("{}{path}", self.base),
                source,
            })
    }

    fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Result<Resp, WireError>, DebugError> {
        let url = self.endpoint(path)?;

        let response = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .map_err(|source| DebugError::ServerUnreachable {
                url: url.to_string(),
                source,
            })?;

        read_blocking(response)
    }
}

fn read_blocking<Resp: DeserializeOwned>(
    response: reqwest::blocking::Response,
) -> Result<Result<Resp, WireError>, DebugError> {
    let status = response.status();
    let url = response.url().to_string();

    let text = response
        .text()
        .map_err(|source| DebugError::ServerUnreachable {
            url: url.clone(),
            source,
        })?;

    parse_body(status, &url, &text)
}

pub(crate) struct AsyncInspectorClient {
    base: Url,
    cache: Arc<CidCache>,
    http: reqwest::Client,
}

impl AsyncInspectorClient {
    pub fn new(base: Url, cache: Arc<CidCache>) -> Result<Self, DebugError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|source| DebugError::ServerUnreachable {
                url: base.to_string(),
                source,
            })?;

        Ok(Self { base, cache, http })
    }

    pub async fn start(&self, full: &StartRequest) -> Result<StartResponse, DebugError> {
        for last_attempt in [false, true] {
            let body = strip_start(&self.cache, full);

            match self.post("api/call/start", &body).await? {
                Ok(response) => {
                    note_accepted(&self.cache, start_cids(full));
                    return Ok(response);
                }
                Err(WireError::CidNotFound { missing_cids }) if !last_attempt => {
                    note_missing(&self.cache, &missing_cids);
                }
                Err(error) => return Err(unexpected(error)),
            }
        }

        Err(DebugError::Protocol(
            "server still missing content after a resend".to_string(),
        ))
    }

    pub async fn complete(&self, full: &CompleteRequest) -> Result<CompleteResponse, DebugError> {
        for last_attempt in [false, true] {
            let body = strip_complete(&self.cache, full);

            match self.post("api/call/complete", &body).await? {
                Ok(response) => {
                    note_accepted(&self.cache, complete_cids(full));
                    return Ok(response);
                }
                Err(WireError::CidNotFound { missing_cids }) if !last_attempt => {
                    note_missing(&self.cache, &missing_cids);
                }
                Err(error) => return Err(unexpected(error)),
            }
        }

        Err(DebugError::Protocol(
            "server still missing content after a resend".to_string(),
        ))
    }

    pub async fn poll(&self, path: &str) -> Result<PollResponse, DebugError> {
        let url = self.endpoint(path)?;

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| DebugError::ServerUnreachable {
                url: url.to_string(),
                source,
            })?;

        match read_async(response).await? {
            Ok(poll) => Ok(poll),
            Err(error) => Err(unexpected(error)),
        }
    }

    /// Same loop as the blocking client, but the wait between polls
    /// yields to the scheduler instead of sleeping the thread.
    pub async fn poll_until_ready(
        &self,
        path: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Action, DebugError> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.poll(path).await? {
                PollResponse::Ready { action } => return Ok(action),
                PollResponse::Waiting => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(DebugError::PollTimeout(timeout));
                    }

                    tokio::time::sleep(interval.min(deadline - now)).await;
                }
            }
        }
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<(), DebugError> {
        match self
            .post::<_, RegisterResponse>("api/callable/register", request)
            .await?
        {
            Ok(_) => Ok(()),
            Err(error) => Err(unexpected(error)),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, DebugError> {
        self.base
            .join(path)
            .map_err(|source| DebugError::InvalidUrl {
                url: format!("{}{path}", self.base),
                source,
            })
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Result<Resp, WireError>, DebugError> {
        let url = self.endpoint(path)?;

        let response = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|source| DebugError::ServerUnreachable {
                url: url.to_string(),
                source,
            })?;

        read_async(response).await
    }
}

async fn read_async<Resp: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Result<Resp, WireError>, DebugError> {
    let status = response.status();
    let url = response.url().to_string();

    let text = response
        .text()
        .await
        .map_err(|source| DebugError::ServerUnreachable {
            url: url.clone(),
            source,
        })?;

    parse_body(status, &url, &text)
}

#[cfg(test)]
mod tests {
    use cideldill_proto::{endpoints::call::CompletionStatus, value::ValueRef};

    use super::{decode_value, strip_complete, wire_form};
    use crate::{cache::CidCache, errors::DebugError};

    #[test]
    fn wire_form_follows_the_cache() {
        let cache = CidCache::default();
        let value = ValueRef::encoded(&5_i64).unwrap();

        assert!(wire_form(&cache, &value).bytes.is_some());

        cache.insert(value.cid.clone());
        assert!(wire_form(&cache, &value).bytes.is_none());

        cache.evict(&value.cid);
        assert!(wire_form(&cache, &value).bytes.is_some());
    }

    #[test]
    fn byteless_action_values_are_a_protocol_error() {
        let bare = ValueRef::encoded(&5_i64).unwrap().bare();

        assert!(matches!(
            decode_value::<i64>(&bare),
            Err(DebugError::Protocol(_))
        ));
    }

    #[test]
    fn strip_complete_reaches_into_the_result() {
        let cache = CidCache::default();
        let result = ValueRef::encoded(&99_i64).unwrap();
        cache.insert(result.cid.clone());

        let full = cideldill_proto::endpoints::call::CompleteRequest {
            call_id: cideldill_proto::calls::CallId::new("1.000000-0".into()),
            status: CompletionStatus::Success,
            result: Some(result),
            exception: None,
        };

        let stripped = strip_complete(&cache, &full);
        assert!(stripped.result.unwrap().bytes.is_none());
    }
}

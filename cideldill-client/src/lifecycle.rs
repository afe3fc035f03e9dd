//! The state machine every intercepted invocation walks through: report
//! the start, obey a pause, dispatch the operator's action, run (or not),
//! report the outcome.

use std::{collections::HashMap, time::Duration};

use cideldill_proto::{
    actions::Action,
    calls::{CallId, CallType, ExceptionInfo},
    endpoints::call::{CompleteRequest, CompletionStatus, StartRequest},
    value::ValueRef,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info, warn};

use crate::{
    args::CallArgs,
    callsite,
    errors::{CallError, DebugError},
    http::decode_value,
    state::DebugState,
};

/// What one intercepted invocation looks like before its arguments and
/// outcome join it.
pub(crate) struct CallSpec<'a> {
    pub call_type: CallType,
    pub method_name: &'a str,
    pub signature: Option<String>,
    /// Full wire form of the target, bytes included.
    pub target: ValueRef,
}

/// The server's action, resolved to something executable: payloads
/// decoded, exception kinds constructed, replacements named.
enum Dispatch<A, R> {
    /// Run the target with these (possibly modified) arguments.
    Run(A),
    /// Hand back this value without running the target.
    Return(R),
    /// Fail without running the target.
    Fail {
        kind: String,
        message: String,
        error: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Run the named replacement with the original argument values.
    Replacement(String),
}

fn resolve<A, R>(state: &DebugState, action: Action, args: A) -> Result<Dispatch<A, R>, DebugError>
where
    A: CallArgs,
    R: DeserializeOwned,
{
    match action {
        Action::Continue => Ok(Dispatch::Run(args)),
        Action::Modify {
            modified_args,
            modified_kwargs,
        } => {
            if !modified_kwargs.is_empty() {
                warn!("ignoring modified keyword arguments; this call surface is positional");
            }

            Ok(Dispatch::Run(args.merged_with(&modified_args)?))
        }
        Action::Skip { fake_result } => Ok(Dispatch::Return(decode_value(&fake_result)?)),
        Action::Raise {
            exception_type,
            exception_message,
        } => Ok(Dispatch::Fail {
            error: state
                .exceptions
                .construct(&exception_type, exception_message.clone()),
            kind: exception_type,
            message: exception_message,
        }),
        Action::Replace { function_name } => Ok(Dispatch::Replacement(function_name)),
        Action::Poll { .. } => Err(DebugError::Protocol(
            "poll delivered where a decision was expected".to_string(),
        )),
    }
}

fn start_request(spec: CallSpec<'_>, arg_refs: Vec<ValueRef>) -> StartRequest {
    StartRequest {
        call_type: spec.call_type,
        method_name: spec.method_name.to_string(),
        signature: spec.signature,
        call_site: callsite::capture(spec.target.cid.clone()),
        target: spec.target,
        args: arg_refs,
        kwargs: HashMap::new(),
    }
}

fn success_request<R: Serialize>(call_id: &CallId, value: &R) -> CompleteRequest {
    let result = match ValueRef::encoded(value) {
        Ok(result) => Some(result),
        Err(error) => {
            warn!(%call_id, %error, "result refused serialization; reporting without it");
            None
        }
    };

    CompleteRequest {
        call_id: call_id.clone(),
        status: CompletionStatus::Success,
        result,
        exception: None,
    }
}

fn exception_request(call_id: &CallId, type_: String, message: String) -> CompleteRequest {
    CompleteRequest {
        call_id: call_id.clone(),
        status: CompletionStatus::Exception,
        result: None,
        exception: Some(ExceptionInfo {
            type_,
            message,
            data: None,
        }),
    }
}

fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full).to_string()
}

/// Drives a blocking intercepted call from start to completion.
///
/// Machinery failures before the target would have run (unreachable
/// server, poll timeout, undecodable payloads) abort the call without a
/// completion report; once an outcome exists, it is reported exactly once
/// and reporting failures never displace it.
pub(crate) fn drive<A, R, E, F>(
    state: &DebugState,
    spec: CallSpec<'_>,
    args: A,
    invoke: F,
) -> Result<R, CallError<E>>
where
    A: CallArgs,
    R: Serialize + DeserializeOwned,
    E: std::error::Error + 'static,
    F: FnOnce(A) -> Result<R, E>,
{
    let arg_refs = args.to_refs().map_err(CallError::from)?;
    let start = start_request(spec, arg_refs.clone());

    let response = state.http.start(&start).map_err(CallError::from)?;
    let call_id = response.call_id;

    let action = match response.action {
        Action::Poll {
            poll_url,
            interval_ms,
            timeout_ms,
        } => state
            .http
            .poll_until_ready(
                &poll_url,
                Duration::from_millis(interval_ms),
                Duration::from_millis(timeout_ms),
            )
            .map_err(CallError::from)?,
        action => action,
    };

    let (outcome, completion) = match resolve(state, action, args).map_err(CallError::from)? {
        Dispatch::Run(args) => match invoke(args) {
            Ok(value) => {
                let completion = success_request(&call_id, &value);
                (Ok(value), completion)
            }
            Err(error) => {
                let completion =
                    exception_request(&call_id, short_type_name::<E>(), error.to_string());
                (Err(CallError::Host(error)), completion)
            }
        },
        Dispatch::Return(value) => {
            let completion = success_request(&call_id, &value);
            (Ok(value), completion)
        }
        Dispatch::Fail {
            kind,
            message,
            error,
        } => {
            let completion = exception_request(&call_id, kind, message);
            (Err(CallError::Debug(DebugError::Injected(error))), completion)
        }
        Dispatch::Replacement(name) => {
            match state
                .replacements
                .invoke(&name, &arg_refs)
                .and_then(|result| decode_value(&result))
            {
                Ok(value) => {
                    let completion = success_request(&call_id, &value);
                    (Ok(value), completion)
                }
                Err(error) => {
                    let completion = exception_request(
                        &call_id,
                        short_type_name::<DebugError>(),
                        error.to_string(),
                    );
                    (Err(CallError::Debug(error)), completion)
                }
            }
        }
    };

    match state.http.complete(&completion) {
        Ok(response) => followup(state, &call_id, response.followup),
        // the outcome is already decided; a lost report must not displace it
        Err(error) => error!(%call_id, %error, "failed to report call completion"),
    }

    outcome
}

/// Async twin of [`drive`]: the same lifecycle, suspending through the
/// scheduler while polling instead of sleeping the thread.
pub(crate) async fn drive_async<A, R, E, F, Fut>(
    state: &DebugState,
    spec: CallSpec<'_>,
    args: A,
    invoke: F,
) -> Result<R, CallError<E>>
where
    A: CallArgs,
    R: Serialize + DeserializeOwned,
    E: std::error::Error + 'static,
    F: FnOnce(A) -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
{
    let arg_refs = args.to_refs().map_err(CallError::from)?;
    let start = start_request(spec, arg_refs.clone());

    let response = state.http_async.start(&start).await.map_err(CallError::from)?;
    let call_id = response.call_id;

    let action = match response.action {
        Action::Poll {
            poll_url,
            interval_ms,
            timeout_ms,
        } => state
            .http_async
            .poll_until_ready(
                &poll_url,
                Duration::from_millis(interval_ms),
                Duration::from_millis(timeout_ms),
            )
            .await
            .map_err(CallError::from)?,
        action => action,
    };

    let (outcome, completion) = match resolve(state, action, args).map_err(CallError::from)? {
        Dispatch::Run(args) => match invoke(args).await {
            Ok(value) => {
                let completion = success_request(&call_id, &value);
                (Ok(value), completion)
            }
            Err(error) => {
                let completion =
                    exception_request(&call_id, short_type_name::<E>(), error.to_string());
                (Err(CallError::Host(error)), completion)
            }
        },
        Dispatch::Return(value) => {
            let completion = success_request(&call_id, &value);
            (Ok(value), completion)
        }
        Dispatch::Fail {
            kind,
            message,
            error,
        } => {
            let completion = exception_request(&call_id, kind, message);
            (Err(CallError::Debug(DebugError::Injected(error))), completion)
        }
        Dispatch::Replacement(name) => {
            match state
                .replacements
                .invoke(&name, &arg_refs)
                .and_then(|result| decode_value(&result))
            {
                Ok(value) => {
                    let completion = success_request(&call_id, &value);
                    (Ok(value), completion)
                }
                Err(error) => {
                    let completion = exception_request(
                        &call_id,
                        short_type_name::<DebugError>(),
                        error.to_string(),
                    );
                    (Err(CallError::Debug(error)), completion)
                }
            }
        }
    };

    match state.http_async.complete(&completion).await {
        Ok(response) => followup_async(state, &call_id, response.followup).await,
        Err(error) => error!(%call_id, %error, "failed to report call completion"),
    }

    outcome
}

/// A `poll` follow-up holds the call here until the operator releases it;
/// any other follow-up is logged, since the outcome is already fixed.
fn followup(state: &DebugState, call_id: &CallId, followup: Option<Action>) {
    match followup {
        None => {}
        Some(Action::Poll {
            poll_url,
            interval_ms,
            timeout_ms,
        }) => {
            match state.http.poll_until_ready(
                &poll_url,
                Duration::from_millis(interval_ms),
                Duration::from_millis(timeout_ms),
            ) {
                Ok(action) => info!(%call_id, ?action, "post-completion hold released"),
                Err(error) => warn!(%call_id, %error, "post-completion hold failed"),
            }
        }
        Some(action) => {
            info!(%call_id, ?action, "ignoring post-completion action; the outcome is already fixed");
        }
    }
}

async fn followup_async(state: &DebugState, call_id: &CallId, followup: Option<Action>) {
    match followup {
        None => {}
        Some(Action::Poll {
            poll_url,
            interval_ms,
            timeout_ms,
        }) => {
            match state
                .http_async
                .poll_until_ready(
                    &poll_url,
                    Duration::from_millis(interval_ms),
                    Duration::from_millis(timeout_ms),
                )
                .await
            {
                Ok(action) => info!(%call_id, ?action, "post-completion hold released"),
                Err(error) => warn!(%call_id, %error, "post-completion hold failed"),
            }
        }
        Some(action) => {
            info!(%call_id, ?action, "ignoring post-completion action; the outcome is already fixed");
        }
    }
}

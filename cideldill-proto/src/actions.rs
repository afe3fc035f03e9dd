use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::value::ValueRef;

/// The server's instruction to the client for a given call.
///
/// Carried in the `call/start` response, in `ready` poll responses, and as
/// an optional follow-up on `call/complete` responses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Run the original callable with its original arguments.
    Continue,
    /// No decision yet. Fetch `poll_url` every `interval_ms` until an
    /// action is ready; give up once `timeout_ms` has elapsed in total.
    Poll {
        poll_url: String,
        interval_ms: u64,
        timeout_ms: u64,
    },
    /// Do not run the callable; use `fake_result` as the call's result.
    Skip { fake_result: ValueRef },
    /// Do not run the callable; fail the call with the named error kind.
    Raise {
        exception_type: String,
        exception_message: String,
    },
    /// Run the callable with replacement arguments merged over the
    /// original slots.
    Modify {
        modified_args: Vec<ValueRef>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        modified_kwargs: HashMap<String, ValueRef>,
    },
    /// Run a different, pre-registered callable with the original
    /// arguments.
    Replace { function_name: String },
}

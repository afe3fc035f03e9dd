use serde::{Deserialize, Serialize};

use crate::actions::Action;

/// `GET /api/poll/<call_id>`: the answer to "has the operator decided yet?"
///
/// An unknown `call_id` is an HTTP 404, not a body variant; a paused call's
/// rendezvous exists from the moment the server answers `poll` until the
/// `ready` response that consumes it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollResponse {
    /// No decision yet; poll again after the agreed interval.
    Waiting,
    /// The operator has decided. This response removes the rendezvous; the
    /// action is delivered exactly once.
    Ready { action: Action },
}

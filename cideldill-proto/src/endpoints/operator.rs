//! The operator-facing surface: JSON endpoints the external UI drives to
//! set breakpoints and to hand decisions to paused calls.

use serde::{Deserialize, Serialize};

use crate::{
    actions::Action,
    calls::{CallId, CallRecord},
};

/// A rule that causes matching calls to pause.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum Breakpoint {
    /// Pause calls whose registered callable name equals `name`.
    Callable { name: String },
    /// Pause every intercepted call.
    All,
    /// Flag calls that complete with an exception.
    OnException,
}

/// `GET /api/breakpoint`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BreakpointList {
    pub breakpoints: Vec<Breakpoint>,
}

/// `POST /api/breakpoint` and `DELETE /api/breakpoint` share this body.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BreakpointRequest {
    #[serde(flatten)]
    pub breakpoint: Breakpoint,
}

/// `POST /api/action/deliver`: hand a decision to a paused call. Rejected
/// when the call is not paused; an action is never buffered for later.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeliverRequest {
    pub call_id: CallId,
    pub action: Action,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeliverResponse {
    pub status: String,
}

/// `GET /api/calls`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CallList {
    pub calls: Vec<CallRecord>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Breakpoint;

    #[test]
    fn breakpoints_tag_on_their_match_kind() {
        assert_eq!(
            serde_json::to_value(Breakpoint::Callable { name: "add".into() }).unwrap(),
            json!({ "match": "callable", "name": "add" })
        );
        assert_eq!(
            serde_json::to_value(Breakpoint::All).unwrap(),
            json!({ "match": "all" })
        );
        assert_eq!(
            serde_json::to_value(Breakpoint::OnException).unwrap(),
            json!({ "match": "on_exception" })
        );
    }
}

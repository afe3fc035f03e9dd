//! The two reports every intercepted invocation makes: one before anything
//! runs, one after the outcome is known.

use std::collections::HashMap;

use serde::{de, ser::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{
    actions::Action,
    calls::{CallId, CallSite, CallType, ExceptionInfo},
    value::ValueRef,
};

/// `POST /api/call/start`.
///
/// The target and every argument arrive as `{cid, bytes?}` pairs; bytes are
/// present only when the client believes the server has not seen that
/// content before.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StartRequest {
    pub call_type: CallType,
    pub method_name: String,
    /// The callable's signature rendering, when the client can produce one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub target: ValueRef,
    pub args: Vec<ValueRef>,
    /// Keyword arguments, for hosts that have them. Always empty from the
    /// Rust client; retained on the wire for the operator UI and for other
    /// hosts.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub kwargs: HashMap<String, ValueRef>,
    pub call_site: CallSite,
}

/// Success body for `call/start`: the assigned identifier plus the action
/// the client must dispatch, flattened into the same object.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StartResponse {
    pub call_id: CallId,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Success,
    Exception,
}

/// `POST /api/call/complete`. Exactly one is accepted per `call_id`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CompleteRequest {
    pub call_id: CallId,
    pub status: CompletionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ValueRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
}

/// Success body for `call/complete`, possibly carrying a follow-up action
/// the operator attached for the moment the call returns.
///
/// Serde impls are written by hand: the follow-up action is flattened into
/// the same object when present and entirely absent otherwise, which a
/// derived flatten over `Option` does not express for a tagged enum.
#[derive(Debug, Clone)]
pub struct CompleteResponse {
    pub status: String,
    pub followup: Option<Action>,
}

impl Serialize for CompleteResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = match &self.followup {
            Some(action) => match serde_json::to_value(action).map_err(S::Error::custom)? {
                Value::Object(map) => map,
                _ => return Err(S::Error::custom("action must serialize to an object")),
            },
            None => serde_json::Map::new(),
        };

        map.insert("status".to_string(), Value::String(self.status.clone()));

        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CompleteResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        let status = value
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| de::Error::missing_field("status"))?
            .to_string();

        let followup = if value.get("action").is_some() {
            Some(serde_json::from_value(value).map_err(de::Error::custom)?)
        } else {
            None
        };

        Ok(Self { status, followup })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CompleteResponse, StartResponse};
    use crate::{actions::Action, calls::CallId};

    #[test]
    fn start_response_flattens_its_action() {
        let response = StartResponse {
            call_id: CallId::new("1722500000.000001-0".into()),
            action: Action::Continue,
        };

        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({
                "call_id": "1722500000.000001-0",
                "action": "continue",
            })
        );
    }

    #[test]
    fn start_response_parses_action_fields_back_out() {
        let body = json!({
            "call_id": "1722500000.000001-0",
            "action": "poll",
            "poll_url": "/api/poll/1722500000.000001-0",
            "interval_ms": 200,
            "timeout_ms": 30_000,
        });

        let response: StartResponse = serde_json::from_value(body).unwrap();
        assert!(matches!(response.action, Action::Poll { interval_ms: 200, .. }));
    }

    #[test]
    fn complete_response_without_followup_is_just_ok() {
        let response = CompleteResponse {
            status: "ok".into(),
            followup: None,
        };

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "status": "ok" })
        );

        let parsed: CompleteResponse =
            serde_json::from_value(json!({ "status": "ok" })).unwrap();
        assert!(parsed.followup.is_none());
    }

    #[test]
    fn complete_response_followup_round_trips() {
        let response = CompleteResponse {
            status: "ok".into(),
            followup: Some(Action::Poll {
                poll_url: "/api/poll/x".into(),
                interval_ms: 100,
                timeout_ms: 5000,
            }),
        };

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["action"], "poll");

        let parsed: CompleteResponse = serde_json::from_value(body).unwrap();
        assert!(matches!(parsed.followup, Some(Action::Poll { .. })));
    }
}

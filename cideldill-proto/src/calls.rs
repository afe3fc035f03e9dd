use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{cid::Cid, value::ValueRef};

/// How an interception was initiated: through a wrapping proxy, or through
/// the one-shot inline call primitive.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Proxy,
    Inline,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Running,
    Paused,
    Completed,
    Failed,
}

/// Identifier of one intercepted invocation.
///
/// Takes the form `<unix-seconds.microseconds>-<per-second-sequence>`, so
/// identifiers sort chronologically and stay readable in logs and in the
/// operator UI. Assigned by the server; the client treats it as opaque.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallId({})", self.0)
    }
}

/// One frame of the stack captured at the moment of interception.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
    pub function: String,
    /// The source line itself, when the file was readable at capture time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_context: Option<String>,
}

/// Stack trace and timestamp captured at the moment of interception.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CallSite {
    pub timestamp: DateTime<Utc>,
    pub target_cid: Cid,
    pub stack_trace: Vec<StackFrame>,
}

/// Wire form of an error outcome: a named kind, a message, and optionally
/// the error value itself.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExceptionInfo {
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ValueRef>,
}

/// The server's record of one intercepted invocation, from start through
/// completion. Argument values are held by reference into the content
/// store.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CallRecord {
    pub call_id: CallId,
    pub call_type: CallType,
    pub method_name: String,
    pub target_cid: Cid,
    pub args: Vec<Cid>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub kwargs: HashMap<String, Cid>,
    pub call_site: CallSite,
    pub started_at: DateTime<Utc>,
    pub status: CallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_cid: Option<Cid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    /// Set when an on-exception rule was armed when the call started.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub break_on_exception: bool,
}

/// A callable the client has made known to the server: the unit that
/// breakpoints match against. Names are either the callable's resolved
/// type path or a user-supplied alias.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RegisteredCallable {
    pub name: String,
    pub signature: String,
    pub target_cid: Cid,
}

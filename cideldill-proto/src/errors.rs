use serde::{Deserialize, Serialize};

use crate::cid::Cid;

/// Protocol-level failures, serialized as `{"error": "...", ...}` bodies.
///
/// These are the failures a well-behaved peer can react to; anything else
/// (unreachable server, malformed JSON in a response) surfaces as a local
/// error on the side that observed it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum WireError {
    /// The sender referenced content this store has never seen. The sender
    /// is expected to evict the listed identifiers from its cache and
    /// resend the affected values with bytes.
    CidNotFound { missing_cids: Vec<Cid> },
    /// Submitted bytes do not hash to their declared identifier. Not
    /// recoverable by resending; the submission is rejected outright.
    CidMismatch,
    /// No record exists for the referenced call.
    UnknownCall,
    /// The referenced call already accepted a completion. Exactly one
    /// completion is accepted per call.
    DuplicateCompletion,
    /// An operator action was delivered for a call that is not paused.
    /// Actions are rejected, never buffered.
    UnknownActionTarget,
    /// The request body did not match the endpoint's schema.
    Malformed { detail: String },
}

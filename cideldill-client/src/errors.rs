use std::time::Duration;

use cideldill_proto::codec::CodecError;

/// Failures of the interception machinery itself.
///
/// Debugging is opt-in, so these fail closed: a call that cannot complete
/// its protocol round-trip fails rather than silently running unobserved.
/// The one exception is completion reporting, which is logged and
/// swallowed so the machinery can never displace a result the host has
/// already produced.
#[derive(Debug, thiserror::Error)]
pub enum DebugError {
    /// The inspector could not be reached, either during the initial
    /// attach handshake or on a later request.
    #[error("inspector unreachable at {url}: {source}")]
    ServerUnreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The inspector answered something the protocol does not allow.
    #[error("protocol violation: {0}")]
    Protocol(String),
    /// The poll deadline for a paused call elapsed with no decision.
    #[error("no operator decision within {0:?}")]
    PollTimeout(Duration),
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A `replace` action named a callable nothing on this host
    /// registered.
    #[error("no replacement registered under {0:?}")]
    UnknownReplacement(String),
    /// The operator injected a failure via the `raise` action.
    #[error("injected: {0}")]
    Injected(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// `set_mode` was handed something other than "ON" or "OFF".
    #[error("unrecognised mode token {0:?} (expected \"ON\" or \"OFF\")")]
    UnknownMode(String),
    /// The inspector holds live runtime values; only loopback URLs are
    /// accepted.
    #[error("refusing non-loopback inspector URL {0}")]
    NonLoopback(String),
    #[error("invalid inspector URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Outcome of one intercepted call against a fallible target: either the
/// target's own failure, handed back unchanged, or a failure of the
/// machinery.
#[derive(Debug, thiserror::Error)]
pub enum CallError<E: std::error::Error + 'static> {
    /// The target itself failed. Reported to the inspector, then
    /// propagated exactly as the target raised it.
    #[error(transparent)]
    Host(E),
    #[error(transparent)]
    Debug(DebugError),
}

impl<E: std::error::Error + 'static> From<DebugError> for CallError<E> {
    fn from(error: DebugError) -> Self {
        Self::Debug(error)
    }
}

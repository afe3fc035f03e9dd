//! Host-side call interception.
//!
//! A program opts in once at startup ([`attach`] or [`set_mode`]), wraps
//! the values it wants watched ([`wrap`]) or intercepts single invocations
//! inline ([`debug_call`]), and from then on every intercepted call is
//! reported to the inspector process, which may pause it, rewrite its
//! arguments, substitute its result, or inject a failure before it
//! completes.
//!
//! When debugging is off every primitive here collapses to a direct call:
//! nothing is fingerprinted, cached, or sent.

pub mod args;
mod cache;
mod callsite;
mod errors;
mod exceptions;
mod http;
mod inline;
mod lifecycle;
mod proxy;
mod replacements;
mod state;

pub use errors::{CallError, DebugError};
pub use exceptions::{register_exception, InjectedException};
pub use inline::{debug_call, debug_call_as, debug_call_as_async, debug_call_async};
pub use proxy::Debugged;
pub use replacements::register_replacement;
pub use state::{
    attach, attach_to, detach, is_enabled, set_mode, wrap, AttachInfo, ConnectionStatus,
};

/// Environment variable naming the inspector's base URL.
pub const SERVER_URL_ENV: &str = "CIDELDILL_SERVER_URL";

/// Where the inspector listens when the environment says nothing.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

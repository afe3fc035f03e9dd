use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::warn;

use crate::state;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// The failure a `raise` action injects when nothing more specific is
/// registered for its kind name. Carries the named kind verbatim.
#[derive(Debug, thiserror::Error)]
#[error("{exception_type}: {message}")]
pub struct InjectedException {
    pub exception_type: String,
    pub message: String,
}

/// Maps exception kind names carried on the wire to constructors of real
/// host error values.
///
/// The `raise` action names a kind and a message, not a live value; this
/// table is how the host picks which error type to materialize. Unknown
/// names fall back to [`InjectedException`].
#[derive(Default)]
pub struct ExceptionRegistry {
    constructors: RwLock<HashMap<String, fn(String) -> BoxedError>>,
}

impl ExceptionRegistry {
    pub fn register(&self, name: &str, constructor: fn(String) -> BoxedError) {
        self.constructors
            .write()
            .insert(name.to_string(), constructor);
    }

    pub fn construct(&self, name: &str, message: String) -> BoxedError {
        match self.constructors.read().get(name) {
            Some(constructor) => constructor(message),
            None => Box::new(InjectedException {
                exception_type: name.to_string(),
                message,
            }),
        }
    }
}

/// Registers a constructor for an exception kind name the operator may
/// raise. The table lives with the attached session and clears on
/// [`crate::detach`].
pub fn register_exception(name: &str, constructor: fn(String) -> BoxedError) {
    match state::current() {
        Some(state) => state.exceptions.register(name, constructor),
        None => warn!(
            name,
            "ignoring exception registration while debugging is detached"
        ),
    }
}

use std::{collections::HashMap, sync::Arc};

use cideldill_proto::value::ValueRef;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::warn;

use crate::{args::CallArgs, errors::DebugError, state};

type Erased = Arc<dyn Fn(&[ValueRef]) -> Result<ValueRef, DebugError> + Send + Sync>;

/// The host-side lookup table behind the `replace` action.
///
/// A replacement is registered under a name the operator can pick; when a
/// call is replaced, the entry is invoked with the original argument
/// values and its result stands in for the call's. Typed callables are
/// erased through the codec at registration time.
#[derive(Default)]
pub struct ReplacementRegistry {
    entries: RwLock<HashMap<String, Erased>>,
}

impl ReplacementRegistry {
    pub fn insert<A, R, F>(&self, name: &str, replacement: F)
    where
        A: CallArgs,
        R: Serialize,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        let erased: Erased = Arc::new(move |refs| {
            let args = A::from_refs(refs)?;
            let result = replacement(args);
            Ok(ValueRef::encoded(&result)?)
        });

        self.entries.write().insert(name.to_string(), erased);
    }

    /// Runs the named replacement against the original argument values.
    /// An unknown name is fatal to the call that asked for it.
    pub fn invoke(&self, name: &str, refs: &[ValueRef]) -> Result<ValueRef, DebugError> {
        let entry = self
            .entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DebugError::UnknownReplacement(name.to_string()))?;

        entry(refs)
    }
}

/// Registers a callable the operator may substitute for an intercepted
/// call via the `replace` action, and announces it to the inspector so it
/// shows up in the callable listing. The registry lives with the attached
/// session and clears on [`crate::detach`].
///
/// Announcement uses the blocking client; call this from synchronous
/// setup code, like [`crate::attach`] itself.
pub fn register_replacement<A, R, F>(name: &str, replacement: F) -> Result<(), DebugError>
where
    A: CallArgs,
    R: Serialize,
    F: Fn(A) -> R + Send + Sync + 'static,
{
    let Some(state) = state::current() else {
        warn!(
            name,
            "ignoring replacement registration while debugging is detached"
        );
        return Ok(());
    };

    state.replacements.insert(name, replacement);
    state.register_callable::<F>(name)?;

    Ok(())
}

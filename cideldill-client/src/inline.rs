//! One-shot interception of a single invocation, no wrapping required.

use std::{convert::Infallible, future::Future};

use cideldill_proto::calls::CallType;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    args::CallArgs,
    errors::{CallError, DebugError},
    lifecycle::{self, CallSpec},
    state::{self, callable_target},
};

/// Intercepts one direct invocation of a callable.
///
/// The display name is derived from the callable's type path; use
/// [`debug_call_as`] to supply an alias instead. Arguments travel as a
/// tuple, and the callable receives the tuple back, possibly rewritten by
/// the operator:
///
/// ```no_run
/// fn add(a: i64, b: i64) -> i64 { a + b }
///
/// let sum = cideldill_client::debug_call(|(a, b)| add(a, b), (2_i64, 3_i64))?;
/// # Ok::<(), cideldill_client::DebugError>(())
/// ```
///
/// With debugging off this is exactly `f(args)`.
pub fn debug_call<A, R, F>(f: F, args: A) -> Result<R, DebugError>
where
    A: CallArgs,
    R: Serialize + DeserializeOwned,
    F: FnOnce(A) -> R,
{
    let name = derived_name::<F>();
    run(&name, f, args)
}

/// [`debug_call`] under an explicit display alias; the alias is what
/// breakpoints match against.
pub fn debug_call_as<A, R, F>(alias: &str, f: F, args: A) -> Result<R, DebugError>
where
    A: CallArgs,
    R: Serialize + DeserializeOwned,
    F: FnOnce(A) -> R,
{
    run(alias, f, args)
}

/// Async counterpart of [`debug_call`].
pub async fn debug_call_async<A, R, F, Fut>(f: F, args: A) -> Result<R, DebugError>
where
    A: CallArgs,
    R: Serialize + DeserializeOwned,
    F: FnOnce(A) -> Fut,
    Fut: Future<Output = R>,
{
    let name = derived_name::<F>();
    run_async(&name, f, args).await
}

/// Async counterpart of [`debug_call_as`].
pub async fn debug_call_as_async<A, R, F, Fut>(alias: &str, f: F, args: A) -> Result<R, DebugError>
where
    A: CallArgs,
    R: Serialize + DeserializeOwned,
    F: FnOnce(A) -> Fut,
    Fut: Future<Output = R>,
{
    run_async(alias, f, args).await
}

fn run<A, R, F>(name: &str, f: F, args: A) -> Result<R, DebugError>
where
    A: CallArgs,
    R: Serialize + DeserializeOwned,
    F: FnOnce(A) -> R,
{
    let Some(state) = state::current() else {
        return Ok(f(args));
    };

    state.register_callable::<F>(name)?;

    let spec = CallSpec {
        call_type: CallType::Inline,
        method_name: name,
        signature: Some(std::any::type_name::<F>().to_string()),
        target: callable_target::<F>(name)?,
    };

    flatten(lifecycle::drive(&state, spec, args, |args| {
        Ok::<R, Infallible>(f(args))
    }))
}

async fn run_async<A, R, F, Fut>(name: &str, f: F, args: A) -> Result<R, DebugError>
where
    A: CallArgs,
    R: Serialize + DeserializeOwned,
    F: FnOnce(A) -> Fut,
    Fut: Future<Output = R>,
{
    let Some(state) = state::current() else {
        return Ok(f(args).await);
    };

    state.register_callable_async::<F>(name).await?;

    let spec = CallSpec {
        call_type: CallType::Inline,
        method_name: name,
        signature: Some(std::any::type_name::<F>().to_string()),
        target: callable_target::<F>(name)?,
    };

    flatten(
        lifecycle::drive_async(&state, spec, args, |args| async move {
            Ok::<R, Infallible>(f(args).await)
        })
        .await,
    )
}

fn flatten<R>(outcome: Result<R, CallError<Infallible>>) -> Result<R, DebugError> {
    match outcome {
        Ok(value) => Ok(value),
        Err(CallError::Debug(error)) => Err(error),
        Err(CallError::Host(never)) => match never {},
    }
}

/// Derives a display name from the callable's type path, trimming the
/// closure suffix the compiler appends.
fn derived_name<F: ?Sized>() -> String {
    std::any::type_name::<F>()
        .trim_end_matches("::{{closure}}")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{debug_call, debug_call_as, derived_name};

    #[test]
    fn detached_inline_calls_run_directly() {
        let sum = debug_call(|(a, b): (i64, i64)| a + b, (2, 3)).unwrap();
        assert_eq!(sum, 5);

        let labelled = debug_call_as("add", |(a, b): (i64, i64)| a + b, (4, 5)).unwrap();
        assert_eq!(labelled, 9);
    }

    #[test]
    fn derived_names_trim_the_closure_suffix() {
        let closure = |x: i64| x;
        let name = derived_name::<i64>();
        assert_eq!(name, "i64");

        fn name_of<F>(_: &F) -> String {
            derived_name::<F>()
        }

        assert!(!name_of(&closure).ends_with("{{closure}}"));
    }
}

//! The transparent wrapper over an arbitrary target value.
//!
//! Plain access forwards to the target (`Deref`, plus the explicitly
//! enumerated operator traits below); interception happens at invocation
//! time through the `call` family, never at field lookup. The sync and
//! async call families are two implementations of the same contract,
//! selected by how the target is invoked.

use std::{
    convert::Infallible,
    fmt,
    future::Future,
    hash::{Hash, Hasher},
    ops::{Deref, DerefMut, Index, IndexMut},
    sync::Arc,
};

use cideldill_proto::{calls::CallType, value::ValueRef};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    args::CallArgs,
    errors::{CallError, DebugError},
    lifecycle::{self, CallSpec},
    state::DebugState,
};

/// A wrapped target. Built by [`crate::wrap`]; when debugging was off at
/// wrap time it holds no session and every call runs the target directly.
pub struct Debugged<T> {
    target: T,
    state: Option<Arc<DebugState>>,
}

impl<T> Debugged<T> {
    pub(crate) fn new(target: T, state: Option<Arc<DebugState>>) -> Self {
        Self { target, state }
    }

    /// Hands the target back, untouched.
    pub fn into_inner(self) -> T {
        self.target
    }

    /// Whether calls through this wrapper run the interception protocol.
    pub fn is_intercepting(&self) -> bool {
        self.state.is_some()
    }
}

impl<T: Serialize> Debugged<T> {
    /// Intercepts one method invocation. The closure receives the target
    /// and the (possibly operator-modified) arguments.
    pub fn call<A, R, F>(&self, method_name: &str, args: A, f: F) -> Result<R, DebugError>
    where
        A: CallArgs,
        R: Serialize + DeserializeOwned,
        F: FnOnce(&T, A) -> R,
    {
        flatten(self.try_call(method_name, args, |target, args| {
            Ok::<R, Infallible>(f(target, args))
        }))
    }

    /// Like [`Self::call`] for targets whose methods can fail: the
    /// target's own error comes back unchanged as [`CallError::Host`].
    pub fn try_call<A, R, E, F>(
        &self,
        method_name: &str,
        args: A,
        f: F,
    ) -> Result<R, CallError<E>>
    where
        A: CallArgs,
        R: Serialize + DeserializeOwned,
        E: std::error::Error + 'static,
        F: FnOnce(&T, A) -> Result<R, E>,
    {
        let Some(state) = &self.state else {
            return f(&self.target, args).map_err(CallError::Host);
        };

        let spec = CallSpec {
            call_type: CallType::Proxy,
            method_name,
            signature: None,
            target: ValueRef::encoded(&self.target).map_err(DebugError::from)?,
        };

        lifecycle::drive(state, spec, args, |args| f(&self.target, args))
    }

    /// Mutating variant: the closure receives `&mut` to the target.
    pub fn call_mut<A, R, F>(&mut self, method_name: &str, args: A, f: F) -> Result<R, DebugError>
    where
        A: CallArgs,
        R: Serialize + DeserializeOwned,
        F: FnOnce(&mut T, A) -> R,
    {
        flatten(self.try_call_mut(method_name, args, |target, args| {
            Ok::<R, Infallible>(f(target, args))
        }))
    }

    pub fn try_call_mut<A, R, E, F>(
        &mut self,
        method_name: &str,
        args: A,
        f: F,
    ) -> Result<R, CallError<E>>
    where
        A: CallArgs,
        R: Serialize + DeserializeOwned,
        E: std::error::Error + 'static,
        F: FnOnce(&mut T, A) -> Result<R, E>,
    {
        let Some(state) = self.state.clone() else {
            return f(&mut self.target, args).map_err(CallError::Host);
        };

        let spec = CallSpec {
            call_type: CallType::Proxy,
            method_name,
            signature: None,
            target: ValueRef::encoded(&self.target).map_err(DebugError::from)?,
        };

        let target = &mut self.target;

        lifecycle::drive(&state, spec, args, move |args| f(target, args))
    }

    /// Async flavor of [`Self::call`]: awaits the method's future and
    /// yields to the scheduler while polling a pause.
    pub async fn call_async<'a, A, R, F, Fut>(
        &'a self,
        method_name: &str,
        args: A,
        f: F,
    ) -> Result<R, DebugError>
    where
        A: CallArgs + 'a,
        R: Serialize + DeserializeOwned,
        F: FnOnce(&'a T, A) -> Fut + 'a,
        Fut: Future<Output = R> + 'a,
    {
        flatten(
            self.try_call_async(method_name, args, |target, args| async move {
                Ok::<R, Infallible>(f(target, args).await)
            })
            .await,
        )
    }

    pub async fn try_call_async<'a, A, R, E, F, Fut>(
        &'a self,
        method_name: &str,
        args: A,
        f: F,
    ) -> Result<R, CallError<E>>
    where
        A: CallArgs,
        R: Serialize + DeserializeOwned,
        E: std::error::Error + 'static,
        F: FnOnce(&'a T, A) -> Fut,
        Fut: Future<Output = Result<R, E>> + 'a,
    {
        let Some(state) = &self.state else {
            return f(&self.target, args).await.map_err(CallError::Host);
        };

        let spec = CallSpec {
            call_type: CallType::Proxy,
            method_name,
            signature: None,
            target: ValueRef::encoded(&self.target).map_err(DebugError::from)?,
        };

        lifecycle::drive_async(state, spec, args, |args| f(&self.target, args)).await
    }
}

fn flatten<R>(outcome: Result<R, CallError<Infallible>>) -> Result<R, DebugError> {
    match outcome {
        Ok(value) => Ok(value),
        Err(CallError::Debug(error)) => Err(error),
        Err(CallError::Host(never)) => match never {},
    }
}

// Non-callable access forwards straight to the target; proxying reads
// would multiply wrappers without aiding debugging.

impl<T> Deref for Debugged<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.target
    }
}

impl<T> DerefMut for Debugged<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.target
    }
}

// The operator slot set, enumerated explicitly and forwarded one by one.

impl<T: fmt::Debug> fmt::Debug for Debugged<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.target.fmt(f)
    }
}

impl<T: fmt::Display> fmt::Display for Debugged<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.target.fmt(f)
    }
}

impl<T: Clone> Clone for Debugged<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            state: self.state.clone(),
        }
    }
}

/// Equality between wrappers defers to the targets. The type system
/// already rules out comparing a wrapper to a bare value.
impl<T: PartialEq> PartialEq for Debugged<T> {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl<T: Eq> Eq for Debugged<T> {}

impl<T: Hash> Hash for Debugged<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target.hash(state);
    }
}

impl<T, I> Index<I> for Debugged<T>
where
    T: Index<I>,
{
    type Output = T::Output;

    fn index(&self, index: I) -> &Self::Output {
        &self.target[index]
    }
}

impl<T, I> IndexMut<I> for Debugged<T>
where
    T: IndexMut<I>,
{
    fn index_mut(&mut self, index: I) -> &mut Self::Output {
        &mut self.target[index]
    }
}

impl<'a, T> IntoIterator for &'a Debugged<T>
where
    &'a T: IntoIterator,
{
    type Item = <&'a T as IntoIterator>::Item;
    type IntoIter = <&'a T as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.target.into_iter()
    }
}

// Binary numeric operators return the target type's own output, never a
// wrapper; arithmetic across wrapped values must not breed wrappers.
macro_rules! forward_binop {
    ($trait:ident, $method:ident) => {
        impl<T: std::ops::$trait<T>> std::ops::$trait for Debugged<T> {
            type Output = T::Output;

            fn $method(self, rhs: Self) -> Self::Output {
                self.target.$method(rhs.target)
            }
        }
    };
}

forward_binop!(Add, add);
forward_binop!(Sub, sub);
forward_binop!(Mul, mul);
forward_binop!(Div, div);

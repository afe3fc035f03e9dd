//! Positional arguments of an intercepted call.
//!
//! Arguments travel as tuples so every slot can be fingerprinted,
//! transmitted, and replaced independently. Implemented for tuples up to
//! eight elements; each element only needs a serde representation.

use cideldill_proto::value::ValueRef;
use serde::{de::DeserializeOwned, Serialize};

use crate::{errors::DebugError, http::decode_value};

pub trait CallArgs: Sized {
    const ARITY: usize;

    /// Reduces each slot to its wire form, bytes included.
    fn to_refs(&self) -> Result<Vec<ValueRef>, DebugError>;

    /// Rebuilds a full argument tuple from wire values, as needed when a
    /// replacement callable is invoked with the original arguments.
    fn from_refs(refs: &[ValueRef]) -> Result<Self, DebugError>;

    /// Applies a `modify` action: replacement slots override, slots the
    /// server did not send keep their original values.
    fn merged_with(self, refs: &[ValueRef]) -> Result<Self, DebugError>;
}

macro_rules! impl_call_args {
    ($arity:expr; $($idx:tt $ty:ident),*) => {
        impl<$($ty: Serialize + DeserializeOwned),*> CallArgs for ($($ty,)*) {
            const ARITY: usize = $arity;

            fn to_refs(&self) -> Result<Vec<ValueRef>, DebugError> {
                Ok(vec![$(ValueRef::encoded(&self.$idx)?),*])
            }

            fn from_refs(refs: &[ValueRef]) -> Result<Self, DebugError> {
                if refs.len() != Self::ARITY {
                    return Err(DebugError::Protocol(format!(
                        "expected {} argument values, got {}",
                        Self::ARITY,
                        refs.len(),
                    )));
                }

                Ok(($(decode_value::<$ty>(&refs[$idx])?,)*))
            }

            #[allow(unused_variables)]
            fn merged_with(self, refs: &[ValueRef]) -> Result<Self, DebugError> {
                if refs.len() > Self::ARITY {
                    return Err(DebugError::Protocol(format!(
                        "got {} replacement arguments for a {}-argument call",
                        refs.len(),
                        Self::ARITY,
                    )));
                }

                Ok(($(
                    match refs.get($idx) {
                        Some(replacement) => decode_value::<$ty>(replacement)?,
                        None => self.$idx,
                    },
                )*))
            }
        }
    };
}

impl_call_args!(0;);
impl_call_args!(1; 0 A0);
impl_call_args!(2; 0 A0, 1 A1);
impl_call_args!(3; 0 A0, 1 A1, 2 A2);
impl_call_args!(4; 0 A0, 1 A1, 2 A2, 3 A3);
impl_call_args!(5; 0 A0, 1 A1, 2 A2, 3 A3, 4 A4);
impl_call_args!(6; 0 A0, 1 A1, 2 A2, 3 A3, 4 A4, 5 A5);
impl_call_args!(7; 0 A0, 1 A1, 2 A2, 3 A3, 4 A4, 5 A5, 6 A6);
impl_call_args!(8; 0 A0, 1 A1, 2 A2, 3 A3, 4 A4, 5 A5, 6 A6, 7 A7);

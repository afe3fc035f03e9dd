//! The serialization codec shared by both peers.
//!
//! Every value that crosses the wire is first reduced to a [`Payload`]
//! envelope and then rendered as canonical JSON text. serde_json's default
//! object map keeps keys sorted, so equal values always render to equal
//! bytes and therefore equal content identifiers.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::cid::Cid;

/// Reconstruction strategy tag carried inside every serialized payload.
///
/// Both peers must agree on this set. A value's own serde implementation is
/// the preferred strategy; types that refuse serialization fall back to a
/// placeholder that identifies them without reconstructing them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// The value's full serde representation.
    Native { value: serde_json::Value },
    /// A value whose type has no serde representation. Round-trips by type
    /// name and debug rendering only; never reconstructs a working value.
    Opaque { type_name: String, repr: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("value of type {type_name} could not be serialized: {source}")]
    Serialize {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("payload could not be decoded: {0}")]
    Deserialize(#[source] serde_json::Error),
    #[error("payload is a placeholder for {type_name} ({repr}) and cannot be reconstructed")]
    Opaque { type_name: String, repr: String },
}

/// Serializes a value to its canonical byte form.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let value = serde_json::to_value(value).map_err(|source| CodecError::Serialize {
        type_name: std::any::type_name::<T>(),
        source,
    })?;

    payload_bytes(&Payload::Native { value })
}

/// Serializes a placeholder for a value that has no serde representation.
pub fn encode_opaque<T: std::fmt::Debug + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    encode_payload(&Payload::Opaque {
        type_name: std::any::type_name::<T>().to_string(),
        repr: format!("{value:?}"),
    })
}

/// Renders an already-built envelope to its canonical byte form, for
/// callers that assemble [`Payload`]s themselves.
pub fn encode_payload(payload: &Payload) -> Result<Vec<u8>, CodecError> {
    payload_bytes(payload)
}

/// Decodes canonical bytes back into a concrete value.
///
/// Placeholder payloads are a distinct error: they identify a value, they
/// do not reconstruct one.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    match decode_payload(bytes)? {
        Payload::Native { value } => serde_json::from_value(value).map_err(CodecError::Deserialize),
        Payload::Opaque { type_name, repr } => Err(CodecError::Opaque { type_name, repr }),
    }
}

/// Decodes canonical bytes into the envelope without reconstructing the
/// value, for peers (and tests) that only need to inspect it.
pub fn decode_payload(bytes: &[u8]) -> Result<Payload, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Deserialize)
}

/// `hash(serialize(v))` in one step.
pub fn cid_of<T: Serialize + ?Sized>(value: &T) -> Result<Cid, CodecError> {
    Ok(Cid::of(&encode(value)?))
}

fn payload_bytes(payload: &Payload) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(payload).map_err(|source| CodecError::Serialize {
        type_name: "Payload",
        source,
    })
}

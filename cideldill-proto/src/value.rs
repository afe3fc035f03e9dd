use serde::{Deserialize, Serialize};

use crate::{
    cid::Cid,
    codec::{self, CodecError},
};

/// A value as it travels on the wire: its content identifier plus, on first
/// transmission, the canonical codec text.
///
/// `bytes` is omitted whenever the sender believes the peer already holds
/// the identified content. A receiver that does not recognise the
/// identifier answers `cid_not_found` and the sender retransmits with
/// bytes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ValueRef {
    pub cid: Cid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<String>,
}

impl ValueRef {
    /// Reduces a serializable value to its wire form, bytes included.
    pub fn encoded<T: Serialize + ?Sized>(value: &T) -> Result<Self, CodecError> {
        let bytes = codec::encode(value)?;
        Ok(Self::from_bytes(bytes))
    }

    /// Reduces a value with no serde representation to a placeholder
    /// reference, bytes included.
    pub fn placeholder<T: std::fmt::Debug + ?Sized>(value: &T) -> Result<Self, CodecError> {
        let bytes = codec::encode_opaque(value)?;
        Ok(Self::from_bytes(bytes))
    }

    /// Wraps already-canonical codec output.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let cid = Cid::of(&bytes);
        // codec output is JSON text, always valid UTF-8
        let text = String::from_utf8_lossy(&bytes).into_owned();

        Self {
            cid,
            bytes: Some(text),
        }
    }

    /// The identifier-only form sent when the peer is believed to already
    /// hold this content.
    pub fn bare(&self) -> Self {
        Self {
            cid: self.cid.clone(),
            bytes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cid::Cid;

    use super::ValueRef;

    #[test]
    fn encoded_cid_matches_carried_bytes() {
        let value = ValueRef::encoded(&vec![1_u32, 2, 3]).unwrap();
        let bytes = value.bytes.as_deref().unwrap();

        assert_eq!(Cid::of(bytes.as_bytes()), value.cid);
    }

    #[test]
    fn bare_form_drops_bytes_only() {
        let value = ValueRef::encoded("anything").unwrap();
        let bare = value.bare();

        assert_eq!(bare.cid, value.cid);
        assert_eq!(bare.bytes, None);
    }

    #[test]
    fn bytes_field_is_absent_from_bare_wire_form() {
        let bare = ValueRef::encoded(&7_i64).unwrap().bare();
        let json = serde_json::to_value(&bare).unwrap();

        assert!(json.get("bytes").is_none());
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

/// Number of lowercase hex characters in a rendered content identifier.
///
/// Client and server must agree on this width. It is the full SHA3-256
/// digest, never truncated.
pub const CID_WIDTH: usize = 64;

/// A stable fingerprint of a value's serialized form.
///
/// Equal serialized bytes produce equal identifiers. Everything downstream
/// of the codec treats the identifier as an opaque string: it is a map key
/// in the content store, a cache key on the client, and a reference on the
/// wire.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(String);

impl Cid {
    /// Fingerprints a serialized byte sequence.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Accepts an identifier received over the wire, rejecting anything
    /// that is not exactly [`CID_WIDTH`] lowercase hex characters.
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() == CID_WIDTH
            && value
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            Some(Self(value.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the first 12 characters are plenty to tell identifiers apart in logs
        write!(f, "Cid({}..)", &self.0[..self.0.len().min(12)])
    }
}

#[cfg(test)]
mod tests {
    use super::{Cid, CID_WIDTH};

    #[test]
    fn equal_bytes_equal_cids() {
        assert_eq!(Cid::of(b"hello"), Cid::of(b"hello"));
        assert_ne!(Cid::of(b"hello"), Cid::of(b"hello "));
    }

    #[test]
    fn rendered_width_is_fixed() {
        assert_eq!(Cid::of(b"").as_str().len(), CID_WIDTH);
        assert_eq!(Cid::of(&[0_u8; 4096]).as_str().len(), CID_WIDTH);
    }

    #[test]
    fn parse_round_trips_and_rejects_junk() {
        let cid = Cid::of(b"some bytes");
        assert_eq!(Cid::parse(cid.as_str()), Some(cid));

        assert_eq!(Cid::parse("deadbeef"), None);
        assert_eq!(Cid::parse(&"G".repeat(CID_WIDTH)), None);
        assert_eq!(Cid::parse(&"AB".repeat(CID_WIDTH / 2)), None);
    }
}

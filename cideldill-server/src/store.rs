use std::collections::HashMap;

use cideldill_proto::{cid::Cid, value::ValueRef};
use parking_lot::RwLock;

/// Rejection of a batch of `{cid, bytes?}` submissions.
#[derive(Debug, PartialEq)]
pub enum AdmitError {
    /// Submitted bytes did not hash to their declared identifier.
    Mismatch { cid: Cid },
    /// One or more identifier-only submissions referenced content the
    /// store has never seen; the sender must resend these with bytes.
    Missing { missing_cids: Vec<Cid> },
}

/// The content-addressed object store: canonical payload text keyed by its
/// fingerprint.
///
/// Append-only for the process lifetime and never persisted; clients treat
/// a restarted (empty) store as a run of cache misses and resend bytes.
#[derive(Default)]
pub struct ContentStore {
    contents: RwLock<HashMap<Cid, String>>,
}

impl ContentStore {
    /// Verifies and admits a batch of submissions.
    ///
    /// Bytes-carrying entries are verified against their declared
    /// identifier first; any disagreement rejects the batch. Verified
    /// bytes are then stored, and only afterwards are identifier-only
    /// entries checked, so a batch that both introduces content and
    /// references it is accepted. Unknown identifier-only references fail
    /// the batch with the full missing list.
    pub fn admit_all<'a>(
        &self,
        values: impl IntoIterator<Item = &'a ValueRef> + Clone,
    ) -> Result<(), AdmitError> {
        for value in values.clone() {
            if let Some(bytes) = &value.bytes {
                if Cid::of(bytes.as_bytes()) != value.cid {
                    return Err(AdmitError::Mismatch {
                        cid: value.cid.clone(),
                    });
                }
            }
        }

        let mut contents = self.contents.write();

        for value in values.clone() {
            if let Some(bytes) = &value.bytes {
                contents
                    .entry(value.cid.clone())
                    .or_insert_with(|| bytes.clone());
            }
        }

        let missing_cids: Vec<Cid> = values
            .into_iter()
            .filter(|v| v.bytes.is_none() && !contents.contains_key(&v.cid))
            .map(|v| v.cid.clone())
            .collect();

        if missing_cids.is_empty() {
            Ok(())
        } else {
            Err(AdmitError::Missing { missing_cids })
        }
    }

    pub fn get(&self, cid: &Cid) -> Option<String> {
        self.contents.read().get(cid).cloned()
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.contents.read().contains_key(cid)
    }
}

#[cfg(test)]
mod tests {
    use cideldill_proto::{cid::Cid, value::ValueRef};

    use super::{AdmitError, ContentStore};

    #[test]
    fn admits_and_serves_verified_bytes() {
        let store = ContentStore::default();
        let value = ValueRef::encoded(&42_i64).unwrap();

        store.admit_all([&value]).unwrap();

        assert!(store.contains(&value.cid));
        assert_eq!(store.get(&value.cid), value.bytes);
    }

    #[test]
    fn rejects_bytes_that_do_not_hash_to_their_cid() {
        let store = ContentStore::default();
        let forged = ValueRef {
            cid: Cid::of(b"something else entirely"),
            bytes: Some("{\"kind\":\"native\",\"value\":1}".into()),
        };

        assert!(matches!(
            store.admit_all([&forged]),
            Err(AdmitError::Mismatch { .. })
        ));
        assert!(!store.contains(&forged.cid));
    }

    #[test]
    fn lists_every_unknown_bare_reference() {
        let store = ContentStore::default();
        let known = ValueRef::encoded(&1_i64).unwrap();
        store.admit_all([&known]).unwrap();

        let unknown_a = ValueRef::encoded(&2_i64).unwrap().bare();
        let unknown_b = ValueRef::encoded(&3_i64).unwrap().bare();

        let error = store
            .admit_all([&known.bare(), &unknown_a, &unknown_b])
            .unwrap_err();

        assert_eq!(
            error,
            AdmitError::Missing {
                missing_cids: vec![unknown_a.cid, unknown_b.cid],
            }
        );
    }

    #[test]
    fn batch_may_reference_content_it_introduces() {
        let store = ContentStore::default();
        let value = ValueRef::encoded(&"shared").unwrap();

        store.admit_all([&value, &value.bare()]).unwrap();
    }
}

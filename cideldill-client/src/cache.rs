use std::num::NonZeroUsize;

use cideldill_proto::cid::Cid;
use lru::LruCache;
use parking_lot::Mutex;

/// How many identifiers the client remembers as already held by the
/// server. Bounds re-send traffic without letting the memory grow with
/// the program's value population.
const CAPACITY: usize = 10_000;

/// The client's belief about which content the server already holds.
///
/// A hit means the next mention of that identifier travels without bytes;
/// a `cid_not_found` answer evicts the identifiers the server disclaimed
/// so the retry carries bytes again. In the absence of server restarts
/// the set is a strict subset of the server's store, because identifiers
/// are only inserted after the server accepted the bytes.
pub struct CidCache {
    inner: Mutex<LruCache<Cid, ()>>,
}

impl Default for CidCache {
    fn default() -> Self {
        Self::with_capacity(CAPACITY)
    }
}

impl CidCache {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// True when the server is believed to hold `cid`. Refreshes the
    /// entry's recency.
    pub fn holds(&self, cid: &Cid) -> bool {
        self.inner.lock().get(cid).is_some()
    }

    pub fn insert(&self, cid: Cid) {
        self.inner.lock().put(cid, ());
    }

    pub fn evict(&self, cid: &Cid) {
        self.inner.lock().pop(cid);
    }
}

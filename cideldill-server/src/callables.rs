use std::collections::HashMap;

use cideldill_proto::calls::RegisteredCallable;
use parking_lot::RwLock;

/// Callables the client has made known to the server: the unit the
/// breakpoint table matches against, and the lookup table behind the
/// `replace` action's `function_name`.
#[derive(Default)]
pub struct CallableRegistry {
    entries: RwLock<HashMap<String, RegisteredCallable>>,
}

impl CallableRegistry {
    /// Registration is idempotent by name; a repeat registration refreshes
    /// the signature and target.
    pub fn register(&self, entry: RegisteredCallable) {
        self.entries.write().insert(entry.name.clone(), entry);
    }

    pub fn get(&self, name: &str) -> Option<RegisteredCallable> {
        self.entries.read().get(name).cloned()
    }

    pub fn list(&self) -> Vec<RegisteredCallable> {
        let mut entries: Vec<_> = self.entries.read().values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}

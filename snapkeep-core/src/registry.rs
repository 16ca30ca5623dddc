//! Process-wide registry of backup sets.
//!
//! # Locking
//!
//! The map itself sits behind one short-lived lock that is only held while a
//! handle is looked up or inserted. Each set has its own lock, held by the
//! engine for the whole of an operation, so two operations on one name run
//! one after the other while different names proceed in parallel.
//!
//! Entries are never removed; the registry is rebuilt empty on restart.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::BackupSet;

/// Shared, individually locked backup set.
pub type SetHandle = Arc<Mutex<BackupSet>>;

#[derive(Debug, Default)]
pub struct Registry {
    sets: Mutex<HashMap<String, SetHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<SetHandle> {
        self.sets.lock().get(name).cloned()
    }

    /// Return the handle for `name`, registering `create()` if absent.
    ///
    /// The flag is `true` when this call inserted the entry.
    pub fn get_or_insert_with(
        &self,
        name: &str,
        create: impl FnOnce() -> BackupSet,
    ) -> (SetHandle, bool) {
        let mut sets = self.sets.lock();
        if let Some(existing) = sets.get(name) {
            return (existing.clone(), false);
        }
        let handle = Arc::new(Mutex::new(create()));
        sets.insert(name.to_string(), handle.clone());
        (handle, true)
    }

    pub fn is_empty(&self) -> bool {
        self.sets.lock().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BackupSetConfig;
    use std::path::Path;

    fn set(name: &str, key: &str) -> BackupSet {
        BackupSet::new(BackupSetConfig::named(name, key), Path::new("/backup"))
    }

    #[test]
    fn first_insert_wins() {
        let registry = Registry::new();
        let (_, created) = registry.get_or_insert_with("db1", || set("db1", "v1"));
        assert!(created);

        let (handle, created) = registry.get_or_insert_with("db1", || set("db1", "v2"));
        assert!(!created);
        assert_eq!(handle.lock().config.compatibility_key, "v1");
    }

    #[test]
    fn handles_share_state() {
        let registry = Registry::new();
        let (handle, _) = registry.get_or_insert_with("db1", || set("db1", "v1"));
        handle.lock().config.frequency = 60;
        let again = registry.get("db1").expect("registered");
        assert_eq!(again.lock().config.frequency, 60);
    }

    #[test]
    fn names_are_independent() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        for name in ["web", "db1", "mail"] {
            registry.get_or_insert_with(name, || set(name, "v1"));
        }
        assert!(!registry.is_empty());
        assert_eq!(registry.get("mail").expect("mail").lock().name(), "mail");
        assert!(registry.get("absent").is_none());
    }
}

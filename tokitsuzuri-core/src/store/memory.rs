//! In-process store

use super::{check_quota, KeyValueStore};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Store that lives only as long as the process
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota: usize,
}

impl MemoryStore {
    /// Create an empty store without a practical quota
    pub fn new() -> Self {
        Self::with_quota(usize::MAX)
    }

    /// Create an empty store limited to `quota` bytes
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota,
        }
    }

    fn apply(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> crate::Result<()>,
    ) -> crate::Result<()> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        f(&mut next)?;
        check_quota(&next, self.quota)?;
        *entries = next;
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> crate::Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> crate::Result<()> {
        self.apply(|entries| {
            entries.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> crate::Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> crate::Result<()> {
        self.entries.lock().clear();
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<&str>) -> crate::Result<String>,
    ) -> crate::Result<()> {
        self.apply(|entries| {
            let value = f(entries.get(key).map(String::as_str))?;
            entries.insert(key.to_string(), value);
            Ok(())
        })
    }
}

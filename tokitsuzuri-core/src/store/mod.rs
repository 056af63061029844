//! Local key-value persistence
//!
//! A small synchronous string store standing in for browser local storage.
//! Values are opaque strings; structured data is stored as JSON text.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

/// Store key holding the API credential
pub const API_KEY_KEY: &str = "openai-api-key";
/// Store key holding the model identifier
pub const MODEL_KEY: &str = "openai-model";
/// Store key holding the JSON-encoded voice settings
pub const VOICE_SETTINGS_KEY: &str = "voice-settings";
/// Store key holding the JSON-encoded diary list
pub const DIARIES_KEY: &str = "aiDiaries";

/// Synchronous key-value storage
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> crate::Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> crate::Result<()>;

    /// Remove a value if present
    fn remove(&self, key: &str) -> crate::Result<()>;

    /// Remove every value
    fn clear(&self) -> crate::Result<()>;

    /// Read, transform and write back a value as one step
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<&str>) -> crate::Result<String>,
    ) -> crate::Result<()>;
}

/// Decode a JSON value stored under `key`
pub fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> crate::Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encode `value` as JSON and store it under `key`
pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> crate::Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// Size of the entries as counted against the quota
pub(crate) fn entries_size(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

/// Reject `entries` if they no longer fit into `quota`
pub(crate) fn check_quota(entries: &BTreeMap<String, String>, quota: usize) -> crate::Result<()> {
    let needed = entries_size(entries);
    if needed > quota {
        return Err(crate::Error::StorageQuotaExceeded { needed, quota });
    }
    Ok(())
}

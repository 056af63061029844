//! JSON file backed store

use super::{check_quota, KeyValueStore};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const STORE_FILE: &str = "store.json";

/// Store persisted as a single JSON object on disk
///
/// The whole object is kept in memory and rewritten on every mutation.
/// Writes go to a temporary file first and are renamed into place, so a
/// failed write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    quota: usize,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or create) the store inside `dir`
    pub fn open<P: AsRef<Path>>(dir: P, quota: usize) -> crate::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STORE_FILE);

        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    let backup = path.with_extension(format!(
                        "json.corrupt-{}",
                        chrono::Utc::now().timestamp()
                    ));
                    warn!(
                        "Store file {:?} is malformed ({}), moving it to {:?}",
                        path, e, backup
                    );
                    std::fs::rename(&path, &backup)?;
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        debug!("Opened store {:?} with {} keys", path, entries.len());
        Ok(Self {
            path,
            quota,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> crate::Result<()> {
        let content = serde_json::to_string(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn apply(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> crate::Result<()>,
    ) -> crate::Result<()> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        f(&mut next)?;
        check_quota(&next, self.quota)?;
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
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
        self.apply(|entries| {
            entries.remove(key);
            Ok(())
        })
    }

    fn clear(&self) -> crate::Result<()> {
        self.apply(|entries| {
            entries.clear();
            Ok(())
        })
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

//! Diary list repository over the local store

use super::record::{next_id, DiaryRecord};
use crate::session::Message;
use crate::store::{KeyValueStore, DIARIES_KEY};
use chrono::{DateTime, TimeZone};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reads and writes the diary list stored under one key
///
/// Every mutation is a whole-list read-modify-write.
#[derive(Clone)]
pub struct DiaryBook {
    store: Arc<dyn KeyValueStore>,
}

impl DiaryBook {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Records in stored (creation) order
    ///
    /// A missing or malformed list reads as empty.
    pub fn records(&self) -> Vec<DiaryRecord> {
        match self.store.get(DIARIES_KEY) {
            Ok(Some(raw)) => decode_list(Some(&raw)),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read diary list: {}", e);
                Vec::new()
            }
        }
    }

    /// Records newest first
    pub fn list(&self) -> Vec<DiaryRecord> {
        let mut records = self.records();
        records.sort_by(|a, b| b.id.cmp(&a.id));
        records
    }

    /// Records whose content or date contains `term`, newest first
    pub fn search(&self, term: &str) -> Vec<DiaryRecord> {
        let term = term.trim();
        self.list()
            .into_iter()
            .filter(|record| term.is_empty() || record.matches(term))
            .collect()
    }

    pub fn find(&self, id: i64) -> Option<DiaryRecord> {
        self.records().into_iter().find(|record| record.id == id)
    }

    /// Create and persist a record with a fresh id
    pub fn create<Tz: TimeZone>(
        &self,
        created_at: &DateTime<Tz>,
        content: &str,
        chat_history: &[Message],
    ) -> crate::Result<DiaryRecord>
    where
        Tz::Offset: std::fmt::Display,
    {
        let mut created = None;
        self.store.update(DIARIES_KEY, &mut |current| {
            let mut records = decode_list(current);
            let id = next_id(&records, created_at.timestamp_millis());
            let record = DiaryRecord::new(id, created_at, content, chat_history.to_vec());
            records.push(record.clone());
            let encoded = serde_json::to_string(&records)?;
            created = Some(record);
            Ok(encoded)
        })?;

        let record = created.ok_or_else(|| {
            crate::Error::Serialization("diary record was not created".to_string())
        })?;
        info!("Saved diary {}", record.id);
        Ok(record)
    }

    /// Remove the record with `id`, keeping the order of the rest
    ///
    /// Returns whether a record was removed.
    pub fn delete(&self, id: i64) -> crate::Result<bool> {
        let mut removed = false;
        self.store.update(DIARIES_KEY, &mut |current| {
            let mut records = decode_list(current);
            let before = records.len();
            records.retain(|record| record.id != id);
            removed = records.len() != before;
            Ok(serde_json::to_string(&records)?)
        })?;

        if removed {
            info!("Deleted diary {}", id);
        } else {
            debug!("No diary with id {} to delete", id);
        }
        Ok(removed)
    }

    /// Overwrite the whole list
    pub fn replace_all(&self, records: &[DiaryRecord]) -> crate::Result<()> {
        crate::store::write_json(self.store.as_ref(), DIARIES_KEY, records)
    }
}

fn decode_list(raw: Option<&str>) -> Vec<DiaryRecord> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Stored diary list is malformed, treating it as empty: {}", e);
        Vec::new()
    })
}

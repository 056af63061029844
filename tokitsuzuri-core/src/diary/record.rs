//! Diary record data structure

use crate::session::Message;
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// Display format of the creation time, as a Japanese locale renders it
const DATE_FORMAT: &str = "%Y/%-m/%-d %-H:%M:%S";

/// A composed diary entry with the conversation it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryRecord {
    /// Creation time in milliseconds since the epoch, unique within the store
    pub id: i64,
    /// Locale-formatted creation time
    pub date: String,
    /// Diary text
    pub content: String,
    /// Conversation snapshot taken at save time
    #[serde(rename = "chatHistory", default)]
    pub chat_history: Vec<Message>,
}

impl DiaryRecord {
    /// Build a record created at `created_at`
    pub fn new<Tz: TimeZone>(
        id: i64,
        created_at: &DateTime<Tz>,
        content: impl Into<String>,
        chat_history: Vec<Message>,
    ) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            id,
            date: format_date(created_at),
            content: content.into(),
            chat_history,
        }
    }

    /// Title taken from the first `# ` heading, if the content has one
    pub fn title(&self) -> Option<&str> {
        self.content
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix("# "))
            .map(str::trim)
            .filter(|title| !title.is_empty())
    }

    /// Whether `term` occurs in the content or date, ignoring case
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.content.to_lowercase().contains(&term) || self.date.to_lowercase().contains(&term)
    }
}

/// Format a timestamp the way diary dates are displayed
pub fn format_date<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(DATE_FORMAT).to_string()
}

/// Next id after `existing`, based on `now_ms` but never reusing or going backwards
pub fn next_id(existing: &[DiaryRecord], now_ms: i64) -> i64 {
    match existing.iter().map(|r| r.id).max() {
        Some(max) if max >= now_ms => max + 1,
        _ => now_ms,
    }
}

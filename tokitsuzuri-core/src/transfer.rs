//! Export and import of the whole data set

use crate::diary::{DiaryBook, DiaryRecord};
use crate::settings::{Settings, VoiceSettings};
use crate::store::KeyValueStore;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Format version written into export documents
pub const EXPORT_VERSION: &str = "1.0.0";

/// Settings carried by an export document; the credential is never exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(
        rename = "voiceSettings",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub voice_settings: Option<VoiceSettings>,
}

/// Full data set as written to an export file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diaries: Option<Vec<DiaryRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<ExportedSettings>,
    #[serde(rename = "exportDate", default)]
    pub export_date: String,
    #[serde(default)]
    pub version: String,
}

impl ExportDocument {
    /// Snapshot the diaries and settings at `exported_at`
    pub fn capture(book: &DiaryBook, settings: &Settings, exported_at: DateTime<Utc>) -> Self {
        Self {
            diaries: Some(book.records()),
            settings: Some(ExportedSettings {
                model: Some(settings.model.clone()),
                voice_settings: Some(settings.voice),
            }),
            export_date: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            version: EXPORT_VERSION.to_string(),
        }
    }

    /// Pretty-printed JSON text
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse an export document
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        serde_json::from_str(raw).map_err(|e| crate::Error::MalformedImport(e.to_string()))
    }

    /// Overwrite stored diaries and settings with whatever this document carries
    ///
    /// The whole document is checked before anything is written. A blank
    /// model is skipped rather than rejected.
    pub fn apply(
        &self,
        store: &dyn KeyValueStore,
        book: &DiaryBook,
        settings: &mut Settings,
    ) -> crate::Result<()> {
        let model = self
            .settings
            .as_ref()
            .and_then(|s| s.model.as_deref())
            .map(str::trim)
            .filter(|m| !m.is_empty());
        let voice = self.settings.as_ref().and_then(|s| s.voice_settings);
        if let Some(voice) = voice {
            voice
                .validate()
                .map_err(|e| crate::Error::MalformedImport(format!("voiceSettings: {}", e)))?;
        }

        if let Some(diaries) = &self.diaries {
            book.replace_all(diaries)?;
            info!("Imported {} diaries", diaries.len());
        }
        if let Some(model) = model {
            settings.set_model(store, model)?;
        }
        if let Some(voice) = voice {
            settings.set_voice(store, voice)?;
        }
        Ok(())
    }
}

/// Default file name for an export made at `at`
pub fn export_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("時綴_データ_{}.json", at.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Message;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn seeded() -> (Arc<MemoryStore>, DiaryBook, Settings) {
        let store = Arc::new(MemoryStore::new());
        let book = DiaryBook::new(store.clone());
        let mut settings = Settings::load(store.as_ref());
        settings.set_api_key(store.as_ref(), "sk-secret").unwrap();
        settings.set_model(store.as_ref(), "gpt-4o").unwrap();
        settings
            .set_voice(
                store.as_ref(),
                VoiceSettings {
                    rate: 1.3,
                    pitch: 1.1,
                    volume: 0.9,
                },
            )
            .unwrap();
        book.create(
            &Utc::now(),
            "# 一日目\n\n晴れ",
            &[Message::user("晴れた"), Message::assistant("いいですね")],
        )
        .unwrap();
        book.create(&Utc::now(), "# 二日目\n\n雨", &[Message::user("雨")])
            .unwrap();
        (store, book, settings)
    }

    #[test]
    fn test_export_then_import_round_trip() {
        let (_, book, settings) = seeded();
        let json = ExportDocument::capture(&book, &settings, Utc::now())
            .to_json()
            .unwrap();

        let target = Arc::new(MemoryStore::new());
        let target_book = DiaryBook::new(target.clone());
        let mut target_settings = Settings::load(target.as_ref());
        ExportDocument::from_json(&json)
            .unwrap()
            .apply(target.as_ref(), &target_book, &mut target_settings)
            .unwrap();

        assert_eq!(target_book.records(), book.records());
        assert_eq!(target_settings.model, settings.model);
        assert_eq!(target_settings.voice, settings.voice);
        assert_eq!(Settings::load(target.as_ref()).voice, settings.voice);
    }

    #[test]
    fn test_export_omits_credential() {
        let (_, book, settings) = seeded();
        let json = ExportDocument::capture(&book, &settings, Utc::now())
            .to_json()
            .unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(json.contains("\"voiceSettings\""));
        assert!(json.contains("\"exportDate\""));
        assert!(json.contains("\"version\": \"1.0.0\""));
    }

    #[test]
    fn test_malformed_import_changes_nothing() {
        let (store, book, settings) = seeded();
        let before = book.records();

        let err = ExportDocument::from_json("{\"diaries\": 3").unwrap_err();
        assert!(matches!(err, crate::Error::MalformedImport(_)));
        assert_eq!(book.records(), before);
        assert_eq!(Settings::load(store.as_ref()), settings);
    }

    #[test]
    fn test_partial_document_only_touches_present_parts() {
        let (store, book, mut settings) = seeded();
        let before = book.records();

        ExportDocument::from_json(r#"{"settings":{"model":"gpt-4o-mini"}}"#)
            .unwrap()
            .apply(store.as_ref(), &book, &mut settings)
            .unwrap();

        assert_eq!(book.records(), before);
        assert_eq!(settings.model, "gpt-4o-mini");
        assert!((settings.voice.rate - 1.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rejected_voice_block_changes_nothing() {
        let (store, book, settings) = seeded();
        let before = book.records();
        let mut current = settings.clone();

        let err = ExportDocument::from_json(
            r##"{"diaries":[{"id":1,"date":"d","content":"# 上書き","chatHistory":[]}],"settings":{"voiceSettings":{"rate":50.0,"pitch":1.0,"volume":1.0}}}"##,
        )
        .unwrap()
        .apply(store.as_ref(), &book, &mut current)
        .unwrap_err();

        assert!(matches!(err, crate::Error::MalformedImport(_)));
        assert_eq!(book.records(), before);
        assert_eq!(current, settings);
        assert_eq!(Settings::load(store.as_ref()), settings);
    }

    #[test]
    fn test_blank_model_is_skipped() {
        let (store, book, mut settings) = seeded();

        ExportDocument::from_json(
            r##"{"diaries":[{"id":1,"date":"d","content":"# 一件","chatHistory":[]}],"settings":{"model":""}}"##,
        )
        .unwrap()
        .apply(store.as_ref(), &book, &mut settings)
        .unwrap();

        assert_eq!(book.records().len(), 1);
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(Settings::load(store.as_ref()).model, "gpt-4o");
    }

    #[test]
    fn test_export_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(export_file_name(&at), "時綴_データ_2024-05-01.json");
    }
}

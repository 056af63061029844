//! Diary composition from a finished conversation

use chrono::Local;
use tokitsuzuri_core::config::GenerationConfig;
use tokitsuzuri_core::{DiaryBook, DiaryRecord, Error, Message, Result, Settings};
use tokitsuzuri_providers::CompletionClient;
use tracing::{info, warn};

use crate::context::{build_diary_request, DIARY_SYSTEM_PROMPT};

/// Turns a conversation into a persisted diary entry
#[derive(Debug, Clone)]
pub struct DiaryComposer {
    generation: GenerationConfig,
}

impl DiaryComposer {
    pub fn new(generation: GenerationConfig) -> Self {
        Self { generation }
    }

    /// Write a diary from `history` and append it to `book`
    ///
    /// Fails with [`Error::EmptyConversation`] or [`Error::CredentialMissing`]
    /// before anything is sent. If the entry cannot be stored the generated
    /// text is lost.
    pub async fn compose(
        &self,
        client: &dyn CompletionClient,
        settings: &Settings,
        book: &DiaryBook,
        history: &[Message],
    ) -> Result<DiaryRecord> {
        if history.is_empty() {
            return Err(Error::EmptyConversation);
        }
        if !settings.has_credential() {
            return Err(Error::CredentialMissing);
        }

        info!("Composing diary from {} messages", history.len());
        let request = build_diary_request(history);
        let content = client
            .complete(
                DIARY_SYSTEM_PROMPT,
                std::slice::from_ref(&request),
                self.generation.max_tokens,
                self.generation.temperature,
            )
            .await?;

        book.create(&Local::now(), &content, history).map_err(|e| {
            warn!("Generated diary could not be stored: {}", e);
            e
        })
    }
}

impl Default for DiaryComposer {
    fn default() -> Self {
        Self::new(GenerationConfig::diary())
    }
}

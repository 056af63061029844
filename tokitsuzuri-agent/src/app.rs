//! Application state controller
//!
//! [`DiaryApp`] owns everything a session needs: settings, the active
//! conversation, the compose draft, speech state, the current screen and
//! the diary book. Every operation that calls the completion endpoint takes
//! `&mut self`, so at most one request is in flight at a time.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokitsuzuri_core::config::Config;
use tokitsuzuri_core::speech::{
    append_transcript, CaptureEffect, CaptureEvent, CaptureState, Platform, RecognitionOptions,
    SpeechCapture, SpeechPlayback,
};
use tokitsuzuri_core::transfer::ExportDocument;
use tokitsuzuri_core::{
    Capabilities, ConversationBuffer, DiaryBook, DiaryRecord, Error, KeyValueStore, Message,
    Result, Screen, Settings, VoiceSettings,
};
use tokitsuzuri_providers::ClientFactory;
use tracing::{debug, info, warn};

use crate::composer::DiaryComposer;
use crate::context::{CHAT_SYSTEM_PROMPT, VOICE_TEST_TEXT};

/// A running diary assistant session
pub struct DiaryApp {
    config: Config,
    store: Arc<dyn KeyValueStore>,
    factory: Arc<dyn ClientFactory>,
    settings: Settings,
    book: DiaryBook,
    buffer: ConversationBuffer,
    draft: String,
    capabilities: Capabilities,
    capture: SpeechCapture,
    playback: SpeechPlayback,
    composer: DiaryComposer,
    screen: Screen,
}

impl DiaryApp {
    /// Load settings from `store` and start on the chat screen
    pub fn new(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        factory: Arc<dyn ClientFactory>,
        capabilities: Capabilities,
        playback: SpeechPlayback,
    ) -> Self {
        let settings = Settings::load(store.as_ref());
        let options = RecognitionOptions::for_platform(
            config.speech.lang.clone(),
            Platform::from_user_agent(config.speech.user_agent.as_deref()),
        );
        let capture = SpeechCapture::new(&capabilities, options);
        let composer = DiaryComposer::new(config.diary.clone());
        let book = DiaryBook::new(store.clone());

        info!(
            model = %settings.model,
            credential = settings.has_credential(),
            "Diary app ready"
        );

        Self {
            config,
            store,
            factory,
            settings,
            book,
            buffer: ConversationBuffer::new(),
            draft: String::new(),
            capabilities,
            capture,
            playback,
            composer,
            screen: Screen::Chat,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn book(&self) -> &DiaryBook {
        &self.book
    }

    pub fn messages(&self) -> &[Message] {
        self.buffer.messages()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn capture_state(&self) -> CaptureState {
        self.capture.state()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Send one user turn and wait for the assistant reply
    ///
    /// Blank input does nothing and yields `None`. Without a credential the
    /// settings screen is opened. On failure the user turn stays in the
    /// conversation and no reply is appended.
    pub async fn send_message(&mut self, text: &str) -> Result<Option<String>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        if !self.settings.has_credential() {
            self.screen = Screen::Settings;
            return Err(Error::CredentialMissing);
        }

        self.buffer.append(Message::user(text));
        let history = self.buffer.snapshot();
        let client = self.factory.create(&self.settings);

        debug!("Requesting reply for {} messages", history.len());
        let reply = client
            .complete(
                CHAT_SYSTEM_PROMPT,
                &history,
                self.config.chat.max_tokens,
                self.config.chat.temperature,
            )
            .await
            .map_err(|e| {
                warn!("Chat completion failed: {}", e);
                Error::from(e)
            })?;

        self.buffer.append(Message::assistant(reply.clone()));
        Ok(Some(reply))
    }

    /// Send the compose draft, clearing it once it has been taken
    ///
    /// The draft is left in place when nothing is sent or no credential is set.
    pub async fn send_draft(&mut self) -> Result<Option<String>> {
        if self.draft.trim().is_empty() || !self.settings.has_credential() {
            let text = self.draft.clone();
            return self.send_message(&text).await;
        }
        let text = std::mem::take(&mut self.draft);
        self.send_message(&text).await
    }

    /// Compose and store a diary from the current conversation
    ///
    /// On success the conversation is cleared and the diary list is shown.
    /// Without a credential the settings screen is opened.
    pub async fn save_diary(&mut self) -> Result<DiaryRecord> {
        let history = self.buffer.snapshot();
        let client = self.factory.create(&self.settings);
        let record = match self
            .composer
            .compose(client.as_ref(), &self.settings, &self.book, &history)
            .await
        {
            Ok(record) => record,
            Err(Error::CredentialMissing) => {
                self.screen = Screen::Settings;
                return Err(Error::CredentialMissing);
            }
            Err(e) => return Err(e),
        };

        self.buffer.reset();
        self.screen = Screen::DiaryList;
        Ok(record)
    }

    pub fn clear_conversation(&mut self) {
        if let Err(e) = self.playback.stop() {
            debug!("Failed to stop playback: {}", e);
        }
        self.buffer.reset();
        info!("Conversation cleared");
    }

    /// Discard the conversation and return to the chat screen
    pub fn start_new_diary(&mut self) -> Vec<CaptureEffect> {
        self.clear_conversation();
        self.draft.clear();
        self.switch_screen(Screen::Chat)
    }

    /// Show `screen`, stopping any capture in progress first
    pub fn switch_screen(&mut self, screen: Screen) -> Vec<CaptureEffect> {
        let effects = if self.capture.state().is_listening() {
            self.handle_capture(CaptureEvent::Stop)
        } else {
            Vec::new()
        };
        debug!("Switching screen {} -> {}", self.screen, screen);
        self.screen = screen;
        effects
    }

    /// Feed a capture event; finalized text lands in the draft
    ///
    /// Returns the effects the host driver still has to carry out.
    pub fn handle_capture(&mut self, event: CaptureEvent) -> Vec<CaptureEffect> {
        let mut pending = Vec::new();
        for effect in self.capture.handle(event) {
            match effect {
                CaptureEffect::AppendTranscript(text) => {
                    self.draft = append_transcript(&self.draft, &text);
                }
                other => pending.push(other),
            }
        }
        pending
    }

    /// Read `text` aloud with the configured voice
    pub fn speak(&self, text: &str) -> Result<()> {
        self.playback.speak(text, &self.settings.voice)
    }

    /// Read the latest assistant reply aloud, if there is one
    pub fn speak_last_reply(&self) -> Result<bool> {
        match self.buffer.last_assistant() {
            Some(message) => {
                self.speak(&message.content)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.playback.is_speaking()
    }

    pub fn stop_speaking(&self) -> Result<()> {
        self.playback.stop()
    }

    pub fn test_voice(&self) -> Result<()> {
        self.speak(VOICE_TEST_TEXT)
    }

    pub fn set_api_key(&mut self, key: &str) -> Result<()> {
        self.settings.set_api_key(self.store.as_ref(), key)
    }

    pub fn set_model(&mut self, model: &str) -> Result<()> {
        self.settings.set_model(self.store.as_ref(), model)
    }

    pub fn set_voice(&mut self, voice: VoiceSettings) -> Result<()> {
        self.settings.set_voice(self.store.as_ref(), voice)
    }

    pub fn list_diaries(&self) -> Vec<DiaryRecord> {
        self.book.list()
    }

    pub fn search_diaries(&self, term: &str) -> Vec<DiaryRecord> {
        self.book.search(term)
    }

    pub fn find_diary(&self, id: i64) -> Option<DiaryRecord> {
        self.book.find(id)
    }

    pub fn delete_diary(&mut self, id: i64) -> Result<bool> {
        self.book.delete(id)
    }

    /// Snapshot of diaries and settings for export
    pub fn export(&self, at: DateTime<Utc>) -> ExportDocument {
        ExportDocument::capture(&self.book, &self.settings, at)
    }

    /// Apply an export document; nothing changes if it cannot be decoded
    pub fn import_json(&mut self, raw: &str) -> Result<()> {
        let document = ExportDocument::from_json(raw)?;
        document.apply(self.store.as_ref(), &self.book, &mut self.settings)?;
        info!("Import applied (version {})", document.version);
        Ok(())
    }

    /// Delete every stored value and return to defaults
    pub fn clear_all(&mut self) -> Result<()> {
        self.store.clear()?;
        self.settings = Settings::default();
        self.buffer.reset();
        self.draft.clear();
        warn!("All stored data cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingFactory, ScriptedReply};
    use tokitsuzuri_core::speech::RecognitionSegment;
    use tokitsuzuri_core::MemoryStore;

    fn app_with(replies: Vec<ScriptedReply>) -> (DiaryApp, Arc<RecordingFactory>) {
        let factory = Arc::new(RecordingFactory::new(replies));
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let capabilities = Capabilities {
            capture: true,
            synthesis: false,
            secure_context: true,
        };
        let app = DiaryApp::new(
            Config::default(),
            store,
            factory.clone(),
            capabilities,
            SpeechPlayback::unavailable("ja-JP"),
        );
        (app, factory)
    }

    #[tokio::test]
    async fn test_send_without_credential_opens_settings() {
        let (mut app, factory) = app_with(vec![]);

        let err = app.send_message("こんにちは").await.unwrap_err();
        assert!(matches!(err, Error::CredentialMissing));
        assert_eq!(app.screen(), Screen::Settings);
        assert!(app.messages().is_empty());
        assert_eq!(factory.calls().len(), 0);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let (mut app, factory) = app_with(vec![]);
        app.set_api_key("sk-test").unwrap();

        assert_eq!(app.send_message("   ").await.unwrap(), None);
        assert!(app.messages().is_empty());
        assert_eq!(factory.calls().len(), 0);
    }

    #[tokio::test]
    async fn test_send_appends_both_turns() {
        let (mut app, factory) = app_with(vec![ScriptedReply::Text("良かったですね".into())]);
        app.set_api_key("sk-test").unwrap();

        let reply = app.send_message(" 今日は楽しかった ").await.unwrap();
        assert_eq!(reply.as_deref(), Some("良かったですね"));
        assert_eq!(
            app.messages(),
            &[
                Message::user("今日は楽しかった"),
                Message::assistant("良かったですね")
            ]
        );

        let calls = factory.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].system_prompt, CHAT_SYSTEM_PROMPT);
        assert_eq!(calls[0].history, vec![Message::user("今日は楽しかった")]);
        assert_eq!(calls[0].max_tokens, 500);
    }

    #[tokio::test]
    async fn test_failed_reply_keeps_user_turn() {
        let (mut app, _) = app_with(vec![ScriptedReply::RateLimited]);
        app.set_api_key("sk-test").unwrap();

        let err = app.send_message("hi").await.unwrap_err();
        assert!(matches!(err, Error::RateLimited));
        assert_eq!(app.messages(), &[Message::user("hi")]);
    }

    #[tokio::test]
    async fn test_save_diary_resets_and_lists() {
        let (mut app, factory) = app_with(vec![
            ScriptedReply::Text("いいですね".into()),
            ScriptedReply::Text("# 晴れの日\n\n散歩した。".into()),
        ]);
        app.set_api_key("sk-test").unwrap();
        app.send_message("散歩した").await.unwrap();
        let history = app.messages().to_vec();

        let record = app.save_diary().await.unwrap();
        assert_eq!(record.chat_history, history);
        assert_eq!(record.title(), Some("晴れの日"));
        assert!(app.messages().is_empty());
        assert_eq!(app.screen(), Screen::DiaryList);
        assert_eq!(app.list_diaries(), vec![record]);

        let calls = factory.calls();
        assert_eq!(calls[1].history.len(), 1);
        assert_eq!(calls[1].max_tokens, 800);
    }

    #[tokio::test]
    async fn test_save_empty_conversation_makes_no_call() {
        let (mut app, factory) = app_with(vec![]);
        app.set_api_key("sk-test").unwrap();

        let err = app.save_diary().await.unwrap_err();
        assert!(matches!(err, Error::EmptyConversation));
        assert_eq!(factory.calls().len(), 0);
        assert_eq!(app.screen(), Screen::Chat);
    }

    #[tokio::test]
    async fn test_save_without_credential_opens_settings() {
        let (mut app, factory) = app_with(vec![]);
        app.buffer.append(Message::user("散歩した"));

        let err = app.save_diary().await.unwrap_err();
        assert!(matches!(err, Error::CredentialMissing));
        assert_eq!(app.screen(), Screen::Settings);
        assert_eq!(app.messages(), &[Message::user("散歩した")]);
        assert_eq!(factory.calls().len(), 0);
    }

    #[tokio::test]
    async fn test_draft_survives_missing_credential() {
        let (mut app, factory) = app_with(vec![ScriptedReply::Text("はい".into())]);
        app.set_draft("今日は");

        let err = app.send_draft().await.unwrap_err();
        assert!(matches!(err, Error::CredentialMissing));
        assert_eq!(app.draft(), "今日は");
        assert_eq!(factory.calls().len(), 0);

        app.set_api_key("sk-test").unwrap();
        app.send_draft().await.unwrap();
        assert_eq!(app.draft(), "");
        assert_eq!(app.messages()[0], Message::user("今日は"));
    }

    #[test]
    fn test_capture_fills_draft_and_stops_on_screen_switch() {
        let (mut app, _) = app_with(vec![]);
        app.set_draft("今日は");

        app.handle_capture(CaptureEvent::Toggle);
        let effects = app.handle_capture(CaptureEvent::PermissionGranted);
        assert!(matches!(effects.as_slice(), [CaptureEffect::StartEngine(_)]));

        let effects = app.handle_capture(CaptureEvent::Results(vec![
            RecognitionSegment::finalized("晴れでした"),
        ]));
        assert!(effects.is_empty());
        assert_eq!(app.draft(), "今日は 晴れでした");

        let effects = app.switch_screen(Screen::DiaryList);
        assert!(matches!(effects.as_slice(), [CaptureEffect::StopEngine]));
        assert!(app.capture_state().is_idle());
        assert_eq!(app.screen(), Screen::DiaryList);
    }

    #[test]
    fn test_speaking_without_synthesis() {
        let (app, _) = app_with(vec![]);
        assert!(matches!(
            app.test_voice(),
            Err(Error::UnsupportedEnvironment(_))
        ));
        assert!(app.stop_speaking().is_ok());
        assert!(!app.speak_last_reply().unwrap());
    }

    #[test]
    fn test_clear_all_resets_settings() {
        let (mut app, _) = app_with(vec![]);
        app.set_api_key("sk-test").unwrap();
        app.set_model("gpt-4o").unwrap();

        app.clear_all().unwrap();
        assert_eq!(app.settings(), &Settings::default());
        assert!(app.list_diaries().is_empty());
    }

    #[test]
    fn test_bad_import_changes_nothing() {
        let (mut app, _) = app_with(vec![]);
        app.set_model("gpt-4o").unwrap();

        let err = app.import_json("[1, 2").unwrap_err();
        assert!(matches!(err, Error::MalformedImport(_)));
        assert_eq!(app.settings().model, "gpt-4o");
    }
}

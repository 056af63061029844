//! Scripted completion client for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokitsuzuri_core::{Message, Settings};
use tokitsuzuri_providers::{ClientFactory, CompletionClient, CompletionError, CompletionResult};

pub(crate) enum ScriptedReply {
    Text(String),
    RateLimited,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub system_prompt: String,
    pub history: Vec<Message>,
    pub max_tokens: u32,
}

#[derive(Default)]
struct Script {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

struct ScriptedClient(Arc<Script>);

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        max_tokens: u32,
        _temperature: f32,
    ) -> CompletionResult<String> {
        self.0.calls.lock().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
            max_tokens,
        });
        match self.0.replies.lock().pop_front() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::RateLimited) => Err(CompletionError::RateLimited),
            None => Err(CompletionError::Transport("script exhausted".to_string())),
        }
    }
}

pub(crate) struct RecordingFactory(Arc<Script>);

impl RecordingFactory {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self(Arc::new(Script {
            replies: Mutex::new(replies.into()),
            calls: Mutex::default(),
        }))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.0.calls.lock().clone()
    }
}

impl ClientFactory for RecordingFactory {
    fn create(&self, _settings: &Settings) -> Arc<dyn CompletionClient> {
        Arc::new(ScriptedClient(self.0.clone()))
    }
}

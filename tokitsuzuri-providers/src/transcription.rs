//! Audio transcription through an OpenAI-compatible Whisper endpoint

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Transcription errors
#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("API key not configured")]
    NoApiKey,

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: HTTP {status}: {body}")]
    ApiError { status: u16, body: String },
}

impl From<TranscriptionError> for tokitsuzuri_core::Error {
    fn from(e: TranscriptionError) -> Self {
        use tokitsuzuri_core::Error;
        match e {
            TranscriptionError::NoApiKey => Error::CredentialMissing,
            TranscriptionError::FileNotFound(path) => Error::NotFound(path),
            TranscriptionError::FileReadError(e) => Error::Io(e),
            TranscriptionError::HttpError(e) => Error::Transport(e.to_string()),
            TranscriptionError::ApiError { status: 401, .. } => Error::CredentialInvalid,
            TranscriptionError::ApiError { status: 429, .. } => Error::RateLimited,
            TranscriptionError::ApiError { status, body } if status >= 500 => {
                Error::RemoteServerError(format!("HTTP {}: {}", status, body))
            }
            other => Error::Speech(other.to_string()),
        }
    }
}

/// Whisper API response
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Speech-to-text over `<api_base>/audio/transcriptions`
#[derive(Clone)]
pub struct TranscriptionService {
    api_key: Option<String>,
    api_url: String,
    model: String,
    language: String,
    timeout: Duration,
}

impl TranscriptionService {
    /// Create a service for the endpoint under `api_base`
    ///
    /// An empty `api_key` counts as not configured. `lang` may be a full
    /// locale such as `ja-JP`; only the language part is sent.
    pub fn new(api_key: &str, api_base: &str, model: &str, lang: &str) -> Self {
        let api_key = Some(api_key.trim().to_string()).filter(|k| !k.is_empty());
        let language = lang.split(['-', '_']).next().unwrap_or(lang).to_string();

        Self {
            api_key,
            api_url: format!(
                "{}/audio/transcriptions",
                api_base.trim_end_matches('/')
            ),
            model: model.to_string(),
            language,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if the service is configured
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Transcribe an audio file (mp3, wav, ogg, flac, m4a, webm)
    pub async fn transcribe<P: AsRef<Path>>(
        &self,
        file_path: P,
    ) -> Result<String, TranscriptionError> {
        let api_key = self.api_key.as_ref().ok_or(TranscriptionError::NoApiKey)?;

        let path = file_path.as_ref();
        if !path.exists() {
            return Err(TranscriptionError::FileNotFound(
                path.to_string_lossy().to_string(),
            ));
        }

        let file_bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();
        debug!(
            "Uploading {} ({} bytes) for transcription",
            file_name,
            file_bytes.len()
        );

        let file_part = Part::bytes(file_bytes).file_name(file_name);
        let form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let client = reqwest::Client::new();
        let response = client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Transcription failed: {} - {}", status, error_text);
            return Err(TranscriptionError::ApiError {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let data: TranscriptionResponse = response.json().await?;
        Ok(data.text)
    }
}

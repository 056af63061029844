//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for tokitsuzuri
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Completion endpoint configuration
    #[serde(default)]
    pub completion: CompletionConfig,
    /// Generation parameters for chat replies
    #[serde(default = "GenerationConfig::chat")]
    pub chat: GenerationConfig,
    /// Generation parameters for diary composition
    #[serde(default = "GenerationConfig::diary")]
    pub diary: GenerationConfig,
    /// Local store configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Speech adapter configuration
    #[serde(default)]
    pub speech: SpeechConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            completion: CompletionConfig::default(),
            chat: GenerationConfig::chat(),
            diary: GenerationConfig::diary(),
            storage: StorageConfig::default(),
            speech: SpeechConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Sampling parameters for one kind of completion call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Maximum tokens in the reply
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl GenerationConfig {
    /// Defaults for conversational replies
    pub fn chat() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
        }
    }

    /// Defaults for diary composition
    pub fn diary() -> Self {
        Self {
            max_tokens: 800,
            temperature: 0.7,
        }
    }
}

/// Local store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the store file
    #[serde(default = "default_storage_dir")]
    pub dir: String,
    /// Maximum serialized size of the store in bytes
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: usize,
}

fn default_storage_dir() -> String {
    "~/.tokitsuzuri/data".to_string()
}

fn default_quota_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            quota_bytes: default_quota_bytes(),
        }
    }
}

/// Speech adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Recognition and synthesis locale
    #[serde(default = "default_speech_lang")]
    pub lang: String,
    /// Model used by the transcription endpoint
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    /// Synthesizer command override (`say`, `espeak-ng`, `espeak`)
    #[serde(default)]
    pub synthesizer: Option<String>,
    /// User agent used for platform policy decisions
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_speech_lang() -> String {
    "ja-JP".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            lang: default_speech_lang(),
            transcription_model: default_transcription_model(),
            synthesizer: None,
            user_agent: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "~/.tokitsuzuri/logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

//! User settings persisted in the local store

use crate::store::{read_json, write_json, KeyValueStore, API_KEY_KEY, MODEL_KEY, VOICE_SETTINGS_KEY};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Model used when none has been chosen
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Required prefix of an API credential
const API_KEY_PREFIX: &str = "sk-";

fn default_unit() -> f32 {
    1.0
}

/// Speech synthesis parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(default = "default_unit")]
    pub rate: f32,
    #[serde(default = "default_unit")]
    pub pitch: f32,
    #[serde(default = "default_unit")]
    pub volume: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

impl VoiceSettings {
    /// Check every parameter is within the range a synthesizer accepts
    pub fn validate(&self) -> crate::Result<()> {
        let mut errors = Vec::new();
        if !(0.1..=10.0).contains(&self.rate) {
            errors.push("rate must be in [0.1, 10.0]");
        }
        if !(0.0..=2.0).contains(&self.pitch) {
            errors.push("pitch must be in [0.0, 2.0]");
        }
        if !(0.0..=1.0).contains(&self.volume) {
            errors.push("volume must be in [0.0, 1.0]");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(crate::Error::Validation(errors.join("; ")))
        }
    }
}

/// Process-wide user settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// API credential, empty when unset
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Speech synthesis parameters
    pub voice: VoiceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            voice: VoiceSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults for anything unset or unreadable
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut settings = Self::default();

        match store.get(API_KEY_KEY) {
            Ok(Some(key)) if !key.trim().is_empty() => settings.api_key = key,
            Ok(_) => {}
            Err(e) => warn!("Failed to read API key: {}", e),
        }

        match store.get(MODEL_KEY) {
            Ok(Some(model)) if !model.trim().is_empty() => settings.model = model,
            Ok(_) => {}
            Err(e) => warn!("Failed to read model: {}", e),
        }

        match read_json::<VoiceSettings>(store, VOICE_SETTINGS_KEY) {
            Ok(Some(voice)) => settings.voice = voice,
            Ok(None) => {}
            Err(e) => warn!("Stored voice settings are unreadable, using defaults: {}", e),
        }

        settings
    }

    /// Whether a credential is configured
    pub fn has_credential(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Validate and persist a new credential
    pub fn set_api_key(&mut self, store: &dyn KeyValueStore, key: &str) -> crate::Result<()> {
        let key = key.trim();
        if key.is_empty() || !key.starts_with(API_KEY_PREFIX) {
            return Err(crate::Error::Validation(format!(
                "API key must start with {}",
                API_KEY_PREFIX
            )));
        }
        store.set(API_KEY_KEY, key)?;
        self.api_key = key.to_string();
        info!("API key updated");
        Ok(())
    }

    /// Persist a new model identifier
    pub fn set_model(&mut self, store: &dyn KeyValueStore, model: &str) -> crate::Result<()> {
        let model = model.trim();
        if model.is_empty() {
            return Err(crate::Error::Validation("model must not be empty".to_string()));
        }
        store.set(MODEL_KEY, model)?;
        self.model = model.to_string();
        info!("Model changed to {}", self.model);
        Ok(())
    }

    /// Validate and persist new voice parameters
    pub fn set_voice(&mut self, store: &dyn KeyValueStore, voice: VoiceSettings) -> crate::Result<()> {
        voice.validate()?;
        write_json(store, VOICE_SETTINGS_KEY, &voice)?;
        self.voice = voice;
        Ok(())
    }

    /// Credential with everything but the prefix and last four characters hidden
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= API_KEY_PREFIX.len() + 4 {
            return "*".repeat(chars.len());
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", API_KEY_PREFIX, tail)
    }
}

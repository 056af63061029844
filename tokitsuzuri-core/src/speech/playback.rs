//! Speech playback adapter

use crate::settings::VoiceSettings;
use crate::Error;
use tracing::{debug, info};

/// A voice offered by the host synthesizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    pub name: String,
    /// BCP 47 tag such as `ja-JP`
    pub lang: String,
}

/// Text to speak plus the parameters to speak it with
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub voice: Option<VoiceInfo>,
}

/// Host text-to-speech engine
pub trait SpeechSynthesizer: Send + Sync {
    fn is_speaking(&self) -> bool;

    /// Stop the current utterance, if any
    fn cancel(&self) -> crate::Result<()>;

    fn voices(&self) -> Vec<VoiceInfo>;

    /// Start speaking; returns once playback has begun
    fn speak(&self, utterance: Utterance) -> crate::Result<()>;
}

/// Reads assistant replies aloud through a host synthesizer
pub struct SpeechPlayback {
    synthesizer: Option<Box<dyn SpeechSynthesizer>>,
    lang: String,
}

impl SpeechPlayback {
    pub fn new(synthesizer: Box<dyn SpeechSynthesizer>, lang: impl Into<String>) -> Self {
        Self {
            synthesizer: Some(synthesizer),
            lang: lang.into(),
        }
    }

    /// Playback on a host with no synthesizer
    pub fn unavailable(lang: impl Into<String>) -> Self {
        Self {
            synthesizer: None,
            lang: lang.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.synthesizer.is_some()
    }

    pub fn is_speaking(&self) -> bool {
        self.synthesizer
            .as_ref()
            .map(|s| s.is_speaking())
            .unwrap_or(false)
    }

    /// Speak `text`, interrupting whatever is playing
    pub fn speak(&self, text: &str, voice: &VoiceSettings) -> crate::Result<()> {
        let synthesizer = self
            .synthesizer
            .as_ref()
            .ok_or_else(|| Error::UnsupportedEnvironment("音声合成".to_string()))?;

        let text = text.trim();
        if text.is_empty() {
            debug!("Nothing to speak");
            return Ok(());
        }

        if synthesizer.is_speaking() {
            synthesizer.cancel()?;
        }

        let chosen = select_voice(&synthesizer.voices(), &self.lang);
        info!(
            voice = chosen.as_ref().map(|v| v.name.as_str()).unwrap_or("default"),
            "Speaking {} chars",
            text.chars().count()
        );

        synthesizer.speak(Utterance {
            text: text.to_string(),
            lang: self.lang.clone(),
            rate: voice.rate,
            pitch: voice.pitch,
            volume: voice.volume,
            voice: chosen,
        })
    }

    /// Stop playback; a no-op when nothing is playing
    pub fn stop(&self) -> crate::Result<()> {
        match &self.synthesizer {
            Some(synthesizer) if synthesizer.is_speaking() => synthesizer.cancel(),
            _ => Ok(()),
        }
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.replace('_', "-").to_ascii_lowercase()
}

/// Pick the voice that best matches `lang`
///
/// An exact tag match wins, then any voice sharing the primary language.
/// `None` leaves the choice to the synthesizer.
pub fn select_voice(voices: &[VoiceInfo], lang: &str) -> Option<VoiceInfo> {
    let wanted = normalize_tag(lang);
    if let Some(exact) = voices.iter().find(|v| normalize_tag(&v.lang) == wanted) {
        return Some(exact.clone());
    }

    let primary = wanted.split('-').next().unwrap_or_default();
    if primary.is_empty() {
        return None;
    }
    voices
        .iter()
        .find(|v| normalize_tag(&v.lang).split('-').next() == Some(primary))
        .cloned()
}

//! Host speech adapters for the terminal
//!
//! Synthesis shells out to `say` (macOS) or `espeak-ng`/`espeak`. Capture
//! has no live microphone here: recorded audio files are transcribed and
//! fed to the capture state machine instead.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tokitsuzuri_agent::DiaryApp;
use tokitsuzuri_core::speech::{
    CaptureEffect, CaptureEvent, RecognitionErrorKind, RecognitionSegment, SpeechSynthesizer,
    Utterance, VoiceInfo,
};
use tokitsuzuri_core::{CapabilityProbe, Error};
use tokitsuzuri_providers::{TranscriptionError, TranscriptionService};
use tracing::{debug, info, warn};

const SYNTHESIZERS: [&str; 3] = ["say", "espeak-ng", "espeak"];

/// Speaking rate of both engines at rate 1.0, in words per minute
const BASE_WPM: f32 = 175.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    Say,
    Espeak,
}

impl Engine {
    fn for_program(name: &str) -> Self {
        if name == "say" {
            Engine::Say
        } else {
            Engine::Espeak
        }
    }
}

/// Text-to-speech through a local command
pub struct CommandSynthesizer {
    program: PathBuf,
    engine: Engine,
    current: Mutex<Option<Child>>,
    voices: OnceCell<Vec<VoiceInfo>>,
}

impl CommandSynthesizer {
    /// Find a synthesizer on `PATH`, trying `preferred` alone when given
    pub fn detect(preferred: Option<&str>) -> Option<Self> {
        let candidates: Vec<&str> = match preferred {
            Some(name) => vec![name],
            None => SYNTHESIZERS.to_vec(),
        };

        candidates.into_iter().find_map(|name| match which::which(name) {
            Ok(program) => {
                info!("Using speech synthesizer {:?}", program);
                Some(Self {
                    program,
                    engine: Engine::for_program(name),
                    current: Mutex::new(None),
                    voices: OnceCell::new(),
                })
            }
            Err(_) => {
                debug!("Speech synthesizer {} not found", name);
                None
            }
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn list_voices(&self) -> Vec<VoiceInfo> {
        let flag = match self.engine {
            Engine::Say => ["-v", "?"].as_slice(),
            Engine::Espeak => ["--voices"].as_slice(),
        };
        match Command::new(&self.program).args(flag).output() {
            Ok(output) => {
                let listing = String::from_utf8_lossy(&output.stdout);
                match self.engine {
                    Engine::Say => parse_say_voices(&listing),
                    Engine::Espeak => parse_espeak_voices(&listing),
                }
            }
            Err(e) => {
                warn!("Failed to list voices: {}", e);
                Vec::new()
            }
        }
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn is_speaking(&self) -> bool {
        let mut current = self.current.lock();
        match current.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                _ => {
                    *current = None;
                    false
                }
            },
            None => false,
        }
    }

    fn cancel(&self) -> tokitsuzuri_core::Result<()> {
        if let Some(mut child) = self.current.lock().take() {
            // kill fails once the process has exited on its own
            if let Err(e) = child.kill() {
                debug!("Synthesizer already finished: {}", e);
            }
            let _ = child.wait();
        }
        Ok(())
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.get_or_init(|| self.list_voices()).clone()
    }

    fn speak(&self, utterance: Utterance) -> tokitsuzuri_core::Result<()> {
        let args = command_args(self.engine, &utterance);
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Speech(format!("failed to start {:?}: {}", self.program, e)))?;
        *self.current.lock() = Some(child);
        Ok(())
    }
}

impl Drop for CommandSynthesizer {
    fn drop(&mut self) {
        let _ = self.cancel();
    }
}

/// Command line for one utterance
fn command_args(engine: Engine, utterance: &Utterance) -> Vec<String> {
    let wpm = (BASE_WPM * utterance.rate).round().max(1.0) as u32;
    let mut args = Vec::new();
    match engine {
        Engine::Say => {
            if let Some(voice) = &utterance.voice {
                args.extend(["-v".to_string(), voice.name.clone()]);
            }
            args.extend(["-r".to_string(), wpm.to_string()]);
            // say has no pitch flag; volume goes through an embedded command
            args.push(format!(
                "[[volm {:.2}]] {}",
                utterance.volume.clamp(0.0, 1.0),
                utterance.text
            ));
        }
        Engine::Espeak => {
            let voice = utterance
                .voice
                .as_ref()
                .map(|v| v.lang.clone())
                .unwrap_or_else(|| utterance.lang.clone());
            let pitch = (utterance.pitch * 50.0).round().clamp(0.0, 99.0) as u32;
            let amplitude = (utterance.volume * 100.0).round().clamp(0.0, 200.0) as u32;
            args.extend([
                "-v".to_string(),
                voice,
                "-s".to_string(),
                wpm.to_string(),
                "-p".to_string(),
                pitch.to_string(),
                "-a".to_string(),
                amplitude.to_string(),
                "--".to_string(),
                utterance.text.clone(),
            ]);
        }
    }
    args
}

/// Parse `say -v ?`, e.g. `Kyoko               ja_JP    # こんにちは`
fn parse_say_voices(listing: &str) -> Vec<VoiceInfo> {
    listing
        .lines()
        .filter_map(|line| {
            let described = line.split('#').next()?.trim();
            let (name, lang) = described.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            if name.is_empty() || lang.is_empty() {
                return None;
            }
            Some(VoiceInfo {
                name: name.to_string(),
                lang: lang.replace('_', "-"),
            })
        })
        .collect()
}

/// Parse `espeak-ng --voices`, skipping the header row
fn parse_espeak_voices(listing: &str) -> Vec<VoiceInfo> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            match columns.as_slice() {
                [_, lang, _, name, ..] => Some(VoiceInfo {
                    name: name.to_string(),
                    lang: lang.to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

/// What the terminal host can do
pub struct HostProbe {
    pub synthesizer: bool,
}

impl CapabilityProbe for HostProbe {
    /// Recorded audio can always be transcribed
    fn capture_available(&self) -> bool {
        true
    }

    fn synthesis_available(&self) -> bool {
        self.synthesizer
    }
}

/// Run one capture session over a recorded audio file
///
/// Permission is implicit for files, so the machine goes straight to
/// listening; the transcript arrives as a single final segment. Returns the
/// notifications to show to the user.
pub async fn capture_from_file(app: &mut DiaryApp, audio: &Path) -> Vec<Error> {
    let mut notices = Vec::new();
    let mut queue: VecDeque<CaptureEffect> = app.handle_capture(CaptureEvent::Start).into();

    while let Some(effect) = queue.pop_front() {
        let next = match effect {
            CaptureEffect::RequestPermission => {
                app.handle_capture(CaptureEvent::PermissionGranted)
            }
            CaptureEffect::StartEngine(options) => {
                let config = app.config();
                let service = TranscriptionService::new(
                    &app.settings().api_key,
                    &config.completion.api_base,
                    &config.speech.transcription_model,
                    &options.lang,
                )
                .with_timeout(std::time::Duration::from_secs(
                    config.completion.timeout_secs,
                ));

                match service.transcribe(audio).await {
                    Ok(text) => {
                        let mut effects = app.handle_capture(CaptureEvent::Results(vec![
                            RecognitionSegment::finalized(text),
                        ]));
                        effects.extend(app.handle_capture(CaptureEvent::EngineEnded));
                        effects
                    }
                    Err(TranscriptionError::HttpError(e)) => {
                        warn!("Transcription request failed: {}", e);
                        app.handle_capture(CaptureEvent::EngineError(
                            RecognitionErrorKind::Network,
                        ))
                    }
                    Err(e) => {
                        notices.push(Error::from(e));
                        app.handle_capture(CaptureEvent::EngineEnded)
                    }
                }
            }
            CaptureEffect::StopEngine | CaptureEffect::AbortEngine => Vec::new(),
            CaptureEffect::AppendTranscript(_) => Vec::new(),
            CaptureEffect::Notify(error) => {
                notices.push(error);
                app.handle_capture(CaptureEvent::Dismiss)
            }
        };
        queue.extend(next);
    }
    notices
}

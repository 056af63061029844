//! Speech capture state machine
//!
//! The machine is driven by discrete [`CaptureEvent`]s coming from the user
//! and from the host recognizer, and answers each one with the
//! [`CaptureEffect`]s the host driver must carry out. It never talks to a
//! recognizer itself, so it can be exercised without any audio stack.
//!
//! ```text
//! Idle ──start──▶ RequestingPermission ──granted──▶ Listening ──end/error/stop──▶ Idle
//!   │                     │
//!   │ unsupported         │ denied
//!   ▼                     ▼
//! Error ◀─────────────────┘ ──dismiss──▶ Idle
//! ```

use crate::capability::Capabilities;
use crate::Error;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::{debug, info, warn};

static ANDROID_UA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)android").unwrap());

/// Capture pipeline state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureState {
    /// No capture in progress
    #[default]
    Idle,
    /// Waiting for the host to grant microphone access
    RequestingPermission,
    /// Recognizer is running
    Listening,
    /// Capture could not start; waiting for the user to dismiss
    Error,
}

impl CaptureState {
    pub fn is_listening(&self) -> bool {
        matches!(self, CaptureState::Listening)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, CaptureState::Idle)
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "Idle"),
            CaptureState::RequestingPermission => write!(f, "RequestingPermission"),
            CaptureState::Listening => write!(f, "Listening"),
            CaptureState::Error => write!(f, "Error"),
        }
    }
}

/// Host platform family, as far as recognition policy cares
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Android,
    Other,
}

impl Platform {
    /// Classify a user agent string; no user agent means a desktop host
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        match user_agent {
            Some(ua) if ANDROID_UA.is_match(ua) => Platform::Android,
            _ => Platform::Other,
        }
    }
}

/// Settings handed to the host recognizer when it starts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub lang: String,
    pub continuous: bool,
    pub interim_results: bool,
    pub max_alternatives: u32,
}

impl RecognitionOptions {
    /// Continuous single-hypothesis recognition in `lang`
    ///
    /// Interim results are unreliable on Android recognizers and are
    /// switched off there.
    pub fn for_platform(lang: impl Into<String>, platform: Platform) -> Self {
        Self {
            lang: lang.into(),
            continuous: true,
            interim_results: platform != Platform::Android,
            max_alternatives: 1,
        }
    }
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self::for_platform("ja-JP", Platform::Other)
    }
}

/// One recognition hypothesis reported by the host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecognitionSegment {
    pub transcript: String,
    pub is_final: bool,
}

impl RecognitionSegment {
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }

    pub fn finalized(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }
}

/// Error codes a host recognizer reports
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    Aborted,
    NoSpeech,
    NotAllowed,
    Network,
    ServiceNotAllowed,
    Other(String),
}

impl RecognitionErrorKind {
    /// Map a recognizer error code such as `no-speech`
    pub fn from_code(code: &str) -> Self {
        match code {
            "aborted" => RecognitionErrorKind::Aborted,
            "no-speech" => RecognitionErrorKind::NoSpeech,
            "not-allowed" => RecognitionErrorKind::NotAllowed,
            "network" => RecognitionErrorKind::Network,
            "service-not-allowed" => RecognitionErrorKind::ServiceNotAllowed,
            other => RecognitionErrorKind::Other(other.to_string()),
        }
    }

    /// Aborts and silence end a session without bothering the user
    fn is_silent(&self) -> bool {
        matches!(
            self,
            RecognitionErrorKind::Aborted | RecognitionErrorKind::NoSpeech
        )
    }

    fn into_error(self) -> Error {
        match self {
            RecognitionErrorKind::NotAllowed => {
                Error::PermissionDenied("microphone access was refused".to_string())
            }
            RecognitionErrorKind::Network => {
                Error::Transport("speech recognition network error".to_string())
            }
            RecognitionErrorKind::ServiceNotAllowed => {
                Error::UnsupportedEnvironment("音声認識サービス".to_string())
            }
            RecognitionErrorKind::Aborted => Error::Speech("aborted".to_string()),
            RecognitionErrorKind::NoSpeech => Error::Speech("no-speech".to_string()),
            RecognitionErrorKind::Other(code) => Error::Speech(code),
        }
    }
}

/// Inputs to the capture machine
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureEvent {
    /// The voice button: stops when listening, starts otherwise
    Toggle,
    /// Begin a capture session
    Start,
    /// The host granted microphone access
    PermissionGranted,
    /// The host refused microphone access
    PermissionDenied(String),
    /// The recognizer produced hypotheses
    Results(Vec<RecognitionSegment>),
    /// The recognizer stopped on its own or after a stop request
    EngineEnded,
    /// The recognizer failed
    EngineError(RecognitionErrorKind),
    /// The user asked to stop
    Stop,
    /// The user acknowledged an error
    Dismiss,
}

/// Work the host driver must perform
#[derive(Debug)]
pub enum CaptureEffect {
    RequestPermission,
    StartEngine(RecognitionOptions),
    StopEngine,
    AbortEngine,
    /// Finalized text to add to the compose field
    AppendTranscript(String),
    /// Error to show to the user
    Notify(Error),
}

/// Speech capture session controller
#[derive(Debug)]
pub struct SpeechCapture {
    state: CaptureState,
    permission_granted: bool,
    engine_live: bool,
    unsupported: Option<&'static str>,
    options: RecognitionOptions,
}

impl SpeechCapture {
    pub fn new(capabilities: &Capabilities, options: RecognitionOptions) -> Self {
        Self {
            state: CaptureState::Idle,
            permission_granted: false,
            engine_live: false,
            unsupported: capabilities.capture_blocker(),
            options,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn permission_granted(&self) -> bool {
        self.permission_granted
    }

    pub fn options(&self) -> &RecognitionOptions {
        &self.options
    }

    /// Feed one event and collect the resulting effects
    pub fn handle(&mut self, event: CaptureEvent) -> Vec<CaptureEffect> {
        debug!("Capture event {:?} in state {}", event, self.state);
        match event {
            CaptureEvent::Toggle => {
                if self.state.is_listening() {
                    self.handle(CaptureEvent::Stop)
                } else {
                    self.handle(CaptureEvent::Start)
                }
            }
            CaptureEvent::Start => self.start(),
            CaptureEvent::PermissionGranted => {
                self.permission_granted = true;
                if self.state == CaptureState::RequestingPermission {
                    let mut effects = Vec::new();
                    self.begin_listening(&mut effects);
                    effects
                } else {
                    Vec::new()
                }
            }
            CaptureEvent::PermissionDenied(reason) => {
                self.permission_granted = false;
                if self.state == CaptureState::RequestingPermission {
                    warn!("Microphone permission denied: {}", reason);
                    self.state = CaptureState::Error;
                    vec![CaptureEffect::Notify(Error::PermissionDenied(reason))]
                } else {
                    Vec::new()
                }
            }
            CaptureEvent::Results(segments) => {
                if !self.state.is_listening() {
                    return Vec::new();
                }
                let transcript: String = segments
                    .iter()
                    .filter(|s| s.is_final)
                    .map(|s| s.transcript.as_str())
                    .collect();
                let transcript = transcript.trim();
                if transcript.is_empty() {
                    Vec::new()
                } else {
                    vec![CaptureEffect::AppendTranscript(transcript.to_string())]
                }
            }
            CaptureEvent::EngineEnded => {
                self.engine_live = false;
                if self.state.is_listening() {
                    info!("Speech capture ended");
                    self.state = CaptureState::Idle;
                }
                Vec::new()
            }
            CaptureEvent::EngineError(kind) => {
                self.engine_live = false;
                if kind == RecognitionErrorKind::NotAllowed {
                    self.permission_granted = false;
                }
                if self.state.is_listening() {
                    self.state = CaptureState::Idle;
                }
                if kind.is_silent() {
                    debug!("Speech capture closed quietly: {:?}", kind);
                    Vec::new()
                } else {
                    warn!("Speech recognition error: {:?}", kind);
                    vec![CaptureEffect::Notify(kind.into_error())]
                }
            }
            CaptureEvent::Stop => match self.state {
                CaptureState::Listening => {
                    self.state = CaptureState::Idle;
                    vec![CaptureEffect::StopEngine]
                }
                CaptureState::RequestingPermission => {
                    self.state = CaptureState::Idle;
                    Vec::new()
                }
                _ => Vec::new(),
            },
            CaptureEvent::Dismiss => {
                if self.state == CaptureState::Error {
                    self.state = CaptureState::Idle;
                }
                Vec::new()
            }
        }
    }

    fn start(&mut self) -> Vec<CaptureEffect> {
        if self.state == CaptureState::RequestingPermission {
            return Vec::new();
        }
        if let Some(what) = self.unsupported {
            self.state = CaptureState::Error;
            return vec![CaptureEffect::Notify(Error::UnsupportedEnvironment(
                what.to_string(),
            ))];
        }

        let mut effects = Vec::new();
        if self.engine_live {
            effects.push(CaptureEffect::AbortEngine);
            self.engine_live = false;
        }

        if self.permission_granted {
            self.begin_listening(&mut effects);
        } else {
            self.state = CaptureState::RequestingPermission;
            effects.push(CaptureEffect::RequestPermission);
        }
        effects
    }

    fn begin_listening(&mut self, effects: &mut Vec<CaptureEffect>) {
        info!("Speech capture listening ({})", self.options.lang);
        self.state = CaptureState::Listening;
        self.engine_live = true;
        effects.push(CaptureEffect::StartEngine(self.options.clone()));
    }
}

/// Join finalized transcript text onto the compose field
pub fn append_transcript(draft: &str, transcript: &str) -> String {
    let current = draft.trim();
    if current.is_empty() {
        transcript.to_string()
    } else {
        format!("{} {}", current, transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supported() -> Capabilities {
        Capabilities {
            capture: true,
            synthesis: true,
            secure_context: true,
        }
    }

    fn capture() -> SpeechCapture {
        SpeechCapture::new(&supported(), RecognitionOptions::default())
    }

    #[test]
    fn test_first_start_requests_permission_then_listens() {
        let mut capture = capture();

        let effects = capture.handle(CaptureEvent::Toggle);
        assert!(matches!(effects.as_slice(), [CaptureEffect::RequestPermission]));
        assert_eq!(capture.state(), CaptureState::RequestingPermission);

        let effects = capture.handle(CaptureEvent::PermissionGranted);
        match effects.as_slice() {
            [CaptureEffect::StartEngine(options)] => {
                assert_eq!(options.lang, "ja-JP");
                assert!(options.continuous);
                assert_eq!(options.max_alternatives, 1);
            }
            other => panic!("unexpected effects {:?}", other),
        }
        assert_eq!(capture.state(), CaptureState::Listening);

        capture.handle(CaptureEvent::EngineEnded);
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[test]
    fn test_granted_permission_is_remembered() {
        let mut capture = capture();
        capture.handle(CaptureEvent::Start);
        capture.handle(CaptureEvent::PermissionGranted);
        capture.handle(CaptureEvent::EngineEnded);

        let effects = capture.handle(CaptureEvent::Start);
        assert!(matches!(effects.as_slice(), [CaptureEffect::StartEngine(_)]));
    }

    #[test]
    fn test_only_final_segments_are_committed() {
        let mut capture = capture();
        capture.handle(CaptureEvent::Start);
        capture.handle(CaptureEvent::PermissionGranted);

        let effects = capture.handle(CaptureEvent::Results(vec![
            RecognitionSegment::finalized("今日は"),
            RecognitionSegment::interim("たのし"),
            RecognitionSegment::finalized("晴れでした"),
        ]));
        match effects.as_slice() {
            [CaptureEffect::AppendTranscript(text)] => assert_eq!(text, "今日は晴れでした"),
            other => panic!("unexpected effects {:?}", other),
        }

        let effects =
            capture.handle(CaptureEvent::Results(vec![RecognitionSegment::interim("えっと")]));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_toggle_while_listening_stops_and_drops_late_results() {
        let mut capture = capture();
        capture.handle(CaptureEvent::Start);
        capture.handle(CaptureEvent::PermissionGranted);

        let effects = capture.handle(CaptureEvent::Toggle);
        assert!(matches!(effects.as_slice(), [CaptureEffect::StopEngine]));
        assert!(capture.state().is_idle());

        let effects = capture.handle(CaptureEvent::Results(vec![RecognitionSegment::finalized(
            "遅れた結果",
        )]));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_restart_before_engine_end_aborts_old_session() {
        let mut capture = capture();
        capture.handle(CaptureEvent::Start);
        capture.handle(CaptureEvent::PermissionGranted);
        capture.handle(CaptureEvent::Stop);

        let effects = capture.handle(CaptureEvent::Start);
        assert!(matches!(
            effects.as_slice(),
            [CaptureEffect::AbortEngine, CaptureEffect::StartEngine(_)]
        ));
    }

    #[test]
    fn test_permission_denied_goes_through_error() {
        let mut capture = capture();
        capture.handle(CaptureEvent::Start);
        let effects = capture.handle(CaptureEvent::PermissionDenied("NotAllowedError".into()));

        assert!(matches!(
            effects.as_slice(),
            [CaptureEffect::Notify(Error::PermissionDenied(_))]
        ));
        assert_eq!(capture.state(), CaptureState::Error);

        capture.handle(CaptureEvent::Dismiss);
        assert!(capture.state().is_idle());
    }

    #[test]
    fn test_unsupported_environment() {
        let caps = Capabilities {
            capture: true,
            synthesis: false,
            secure_context: false,
        };
        let mut capture = SpeechCapture::new(&caps, RecognitionOptions::default());
        let effects = capture.handle(CaptureEvent::Toggle);

        assert!(matches!(
            effects.as_slice(),
            [CaptureEffect::Notify(Error::UnsupportedEnvironment(_))]
        ));
        assert_eq!(capture.state(), CaptureState::Error);
    }

    #[test]
    fn test_engine_errors() {
        let mut capture = capture();
        capture.handle(CaptureEvent::Start);
        capture.handle(CaptureEvent::PermissionGranted);

        let effects = capture.handle(CaptureEvent::EngineError(RecognitionErrorKind::from_code(
            "no-speech",
        )));
        assert!(effects.is_empty());
        assert!(capture.state().is_idle());

        capture.handle(CaptureEvent::Start);
        let effects = capture.handle(CaptureEvent::EngineError(RecognitionErrorKind::NotAllowed));
        assert!(matches!(
            effects.as_slice(),
            [CaptureEffect::Notify(Error::PermissionDenied(_))]
        ));
        assert!(!capture.permission_granted());

        let effects = capture.handle(CaptureEvent::Start);
        assert!(matches!(effects.as_slice(), [CaptureEffect::RequestPermission]));
    }

    #[test]
    fn test_platform_policy() {
        let android = Platform::from_user_agent(Some(
            "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36",
        ));
        assert_eq!(android, Platform::Android);
        assert!(!RecognitionOptions::for_platform("ja-JP", android).interim_results);

        let desktop = Platform::from_user_agent(None);
        assert!(RecognitionOptions::for_platform("ja-JP", desktop).interim_results);
    }

    #[test]
    fn test_append_transcript() {
        assert_eq!(append_transcript("", "こんにちは"), "こんにちは");
        assert_eq!(append_transcript("  今日は  ", "晴れ"), "今日は 晴れ");
    }
}

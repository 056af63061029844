//! Speech capture and playback adapters
//!
//! Neither adapter implements a speech engine. Capture is a state machine
//! that tells the host driver what to do with its recognizer; playback
//! forwards utterances to a host synthesizer.

pub mod capture;
pub mod playback;

pub use capture::{
    append_transcript, CaptureEffect, CaptureEvent, CaptureState, Platform, RecognitionErrorKind,
    RecognitionOptions, RecognitionSegment, SpeechCapture,
};
pub use playback::{select_voice, SpeechPlayback, SpeechSynthesizer, Utterance, VoiceInfo};

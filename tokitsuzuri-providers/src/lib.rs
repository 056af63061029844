//! Remote model clients for tokitsuzuri
//!
//! Chat completion against an OpenAI-compatible endpoint, plus audio
//! transcription for speech capture from recorded files.

pub mod base;
pub mod openai;
pub mod transcription;

pub use base::{ClientFactory, CompletionClient, CompletionError, CompletionResult};
pub use openai::{OpenAiClient, OpenAiClientFactory};
pub use transcription::{TranscriptionError, TranscriptionService};

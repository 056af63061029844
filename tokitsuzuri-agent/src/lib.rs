//! Conversation and diary logic for tokitsuzuri
//!
//! This crate provides prompt assembly, diary composition and the
//! application state controller that ties them to storage and speech.

pub mod app;
pub mod composer;
pub mod context;

#[cfg(test)]
mod testing;

pub use app::DiaryApp;
pub use composer::DiaryComposer;
pub use context::{CHAT_SYSTEM_PROMPT, DIARY_SYSTEM_PROMPT, GREETING, VOICE_TEST_TEXT};

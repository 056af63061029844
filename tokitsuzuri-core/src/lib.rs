//! Core types and state for tokitsuzuri
//!
//! This crate holds the data model, local persistence, settings, the diary
//! book and the speech state machines shared by the other tokitsuzuri
//! components.

pub mod capability;
pub mod config;
pub mod diary;
pub mod error;
pub mod logging;
pub mod navigation;
pub mod session;
pub mod settings;
pub mod speech;
pub mod store;
pub mod transfer;
pub mod utils;

pub use capability::{Capabilities, CapabilityProbe};
pub use diary::{DiaryBook, DiaryRecord};
pub use error::{Error, Result};
pub use navigation::Screen;
pub use session::{ConversationBuffer, Message, Role};
pub use settings::{Settings, VoiceSettings};
pub use store::{FileStore, KeyValueStore, MemoryStore};

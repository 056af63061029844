//! Mutually exclusive application views

use std::fmt;

/// The view currently shown to the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Screen {
    /// Conversation with the assistant
    #[default]
    Chat,
    /// Saved diaries
    DiaryList,
    /// Credential, model and voice settings
    Settings,
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::Chat => write!(f, "chat"),
            Screen::DiaryList => write!(f, "diary-list"),
            Screen::Settings => write!(f, "settings"),
        }
    }
}

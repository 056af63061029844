//! Conversation state for the active chat session

pub mod buffer;
pub mod message;

pub use buffer::ConversationBuffer;
pub use message::{Message, Role};

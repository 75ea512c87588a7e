//! UI-agnostic application state types
//!
//! The renderer observes a single `UiState` value that is replaced
//! atomically on every transition; no history of past states is kept here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The single source-of-truth value describing what the UI should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiState {
    /// No interaction has occurred yet. Entered once at construction.
    Initial,
    /// A request is in flight.
    Loading,
    /// The remote call produced text. Re-published with a growing payload
    /// on every streamed chunk; empty if the stream produced no tokens.
    Success { text: String },
    /// The remote call failed. `message` is the only diagnostic surfaced.
    Error { message: String },
}

impl UiState {
    pub fn is_loading(&self) -> bool {
        matches!(self, UiState::Loading)
    }
}

/// The sender of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(dead_code)]
pub enum Role {
    User,
    Model,
    Error,
}

/// One turn in a chat conversation.
///
/// Not consumed by the single-shot flow yet; kept for a future multi-turn
/// screen. A message is created pending and resolved when its response
/// arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(dead_code)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub role: Role,
    pub pending: bool,
}

#[allow(dead_code)]
impl ChatMessage {
    pub fn new(role: Role, text: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            role,
            pending: false,
        }
    }

    /// A user turn that is still waiting for its response.
    pub fn pending(text: &str) -> Self {
        Self {
            pending: true,
            ..Self::new(Role::User, text)
        }
    }

    pub fn resolve(&mut self) {
        self.pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_are_unique() {
        let a = ChatMessage::new(Role::User, "hello");
        let b = ChatMessage::new(Role::User, "hello");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn pending_message_resolves() {
        let mut msg = ChatMessage::pending("summarize this");
        assert!(msg.pending);
        assert_eq!(msg.role, Role::User);

        msg.resolve();
        assert!(!msg.pending);
    }

    #[test]
    fn loading_check() {
        assert!(UiState::Loading.is_loading());
        assert!(!UiState::Initial.is_loading());
        assert!(!UiState::Success { text: String::new() }.is_loading());
    }
}

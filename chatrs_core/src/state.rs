//! The durable, append-only conversation log.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ChatMessage, Role};

/// One role-tagged message in the log. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub content: String,
}

impl Turn {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Ordered turns of one session.
///
/// `turns` only grows: there is no way to remove or reorder entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationState {
    session_id: String,
    turns: Vec<Turn>,
}

impl ConversationState {
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            turns: Vec::new(),
        }
    }

    /// Rebuild a state from previously persisted turns.
    #[must_use]
    pub fn with_turns(session_id: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            session_id: session_id.into(),
            turns,
        }
    }

    /// A fresh session with a generated id.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub fn first_user_turn(&self) -> Option<&Turn> {
        self.turns.iter().find(|t| t.role == Role::User)
    }

    /// The log as role/content pairs, in conversation order.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .map(|t| ChatMessage {
                role: t.role,
                content: t.content.clone(),
            })
            .collect()
    }

    #[must_use]
    pub fn count_role(&self, role: Role) -> usize {
        self.turns.iter().filter(|t| t.role == role).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut state = ConversationState::new("s1");
        assert!(state.is_empty());

        state.append(Turn::user("hello"));
        state.append(Turn::assistant("hi"));
        state.append(Turn::system("note"));

        let roles: Vec<Role> = state.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::System]);
        assert_eq!(state.count_role(Role::User), 1);
        assert_eq!(state.messages()[1].content, "hi");
    }

    #[test]
    fn first_user_turn_skips_leading_system() {
        let mut state = ConversationState::new("s1");
        state.append(Turn::system("boot"));
        state.append(Turn::user("question"));
        assert_eq!(state.first_user_turn().unwrap().content, "question");
    }

    #[test]
    fn turn_ids_are_unique() {
        let a = Turn::user("x");
        let b = Turn::user("x");
        assert_ne!(a.id, b.id);
    }
}

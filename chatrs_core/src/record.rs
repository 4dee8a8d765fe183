//! The persisted representation of a conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConversationState, Turn};

/// Maximum title length, in characters.
pub const TITLE_MAX_CHARS: usize = 100;

/// Truncate `content` to at most [`TITLE_MAX_CHARS`] characters.
#[must_use]
pub fn derive_title(content: &str) -> String {
    content.chars().take(TITLE_MAX_CHARS).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub id: String,
    pub title: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub turns: Vec<Turn>,
    pub path: String,
}

impl ChatRecord {
    /// Snapshot `state` for `user_id`.
    ///
    /// The title comes from the first user turn; a log without one gets an
    /// empty title.
    #[must_use]
    pub fn from_state(
        state: &ConversationState,
        user_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let title = state
            .first_user_turn()
            .map(|t| derive_title(&t.content))
            .unwrap_or_default();

        Self {
            id: state.session_id().to_string(),
            title,
            user_id: user_id.into(),
            created_at,
            turns: state.turns().to_vec(),
            path: Self::path_for(state.session_id()),
        }
    }

    #[must_use]
    pub fn path_for(id: &str) -> String {
        format!("/chat/{id}")
    }

    #[must_use]
    pub fn to_state(&self) -> ConversationState {
        ConversationState::with_turns(self.id.clone(), self.turns.clone())
    }

    #[must_use]
    pub fn summary(&self) -> ChatSummary {
        ChatSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
        }
    }
}

/// Listing view of a stored record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

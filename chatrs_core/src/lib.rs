#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

pub mod credential;
pub mod record;
pub mod state;

pub use credential::{Credential, CredentialPool, CredentialSelector};
pub use record::{ChatRecord, ChatSummary, TITLE_MAX_CHARS, derive_title};
pub use state::{ConversationState, Turn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Role/content pair sent to the model as conversation context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// One event from a streaming completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental assistant text.
    Delta(String),
    /// Terminal signal carrying the full accumulated text.
    Done(String),
}

pub type CompletionStream = Pin<Box<dyn Stream<Item = anyhow::Result<StreamEvent>> + Send>>;

/// A remote model that streams chat completions.
///
/// `open_stream` resolves once the provider has accepted the request; the
/// returned stream then yields deltas in arrival order and ends with exactly
/// one [`StreamEvent::Done`].
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn open_stream(
        &self,
        credential: &Credential,
        messages: &[ChatMessage],
    ) -> anyhow::Result<CompletionStream>;

    fn model(&self) -> &str;
}

/// Durable storage for conversation records, keyed by session id.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Insert or overwrite the record with `record.id`.
    async fn save(&self, record: &ChatRecord) -> anyhow::Result<()>;

    async fn load(&self, id: &str) -> anyhow::Result<Option<ChatRecord>>;

    /// Records owned by `user_id`, newest first.
    async fn list(&self, user_id: &str) -> anyhow::Result<Vec<ChatSummary>>;

    async fn remove(&self, id: &str) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: LLMProvider + ?Sized> LLMProvider for std::sync::Arc<T> {
    async fn open_stream(
        &self,
        credential: &Credential,
        messages: &[ChatMessage],
    ) -> anyhow::Result<CompletionStream> {
        (**self).open_stream(credential, messages).await
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}

#[async_trait]
impl<T: ChatStore + ?Sized> ChatStore for std::sync::Arc<T> {
    async fn save(&self, record: &ChatRecord) -> anyhow::Result<()> {
        (**self).save(record).await
    }

    async fn load(&self, id: &str) -> anyhow::Result<Option<ChatRecord>> {
        (**self).load(id).await
    }

    async fn list(&self, user_id: &str) -> anyhow::Result<Vec<ChatSummary>> {
        (**self).list(user_id).await
    }

    async fn remove(&self, id: &str) -> anyhow::Result<()> {
        (**self).remove(id).await
    }
}

//! Session controller for multi-turn streaming conversations.
//!
//! A submission runs in two phases. [`SessionController::begin`] appends the
//! user turn and the optimistic display entries synchronously;
//! [`PendingCycle::resolve`] then opens the model stream under the retry
//! policy and hands back either a live reply or a static error notice. The
//! stream itself is drained by a spawned task that records the assistant turn
//! and persists the record once the terminal signal arrives.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chatrs_core::{
    ChatMessage, ChatRecord, ChatStore, CompletionStream, ConversationState, CredentialPool,
    CredentialSelector, LLMProvider, Role, StreamEvent, Turn,
};
use chatrs_providers::{RandomSelector, RetryPolicy};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::display::{DisplayEntry, DisplayState};
use crate::stream::{StreamHandle, stream_channel};

/// Text of the system turn recorded when a cycle fails.
pub const ERROR_TURN_PREFIX: &str = "An error occurred while processing your request";

/// Text shown in place of a reply when a cycle fails.
pub const ERROR_NOTICE: &str = "Error: Unable to process your request. Please try again.";

/// Identity of one session, passed in explicitly at construction.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    /// Owner of the session. `None` disables persistence.
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionContext {
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            owner: None,
            created_at: Utc::now(),
        }
    }

    /// A new session with a generated id.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// Longest wait for the next chunk of a reply that is already streaming.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Sent ahead of the log on every call; never stored in it.
    pub system_prompt: Option<String>,
    pub retry: RetryPolicy,
    /// Once the stream is open, a gap longer than this between events fails
    /// the cycle.
    pub idle_timeout: Duration,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            retry: RetryPolicy::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl ConversationConfig {
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = Some(prompt).filter(|p| !p.trim().is_empty());
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("A reply is still being generated for session {0}")]
    CycleInFlight(String),

    #[error("Session {0} belongs to another user")]
    NotOwner(String),

    #[error("Session storage error: {0}")]
    Store(#[from] anyhow::Error),
}

/// How a submission cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed {
        reply: String,
        /// Whether the record reached the store.
        persisted: bool,
    },
    Failed {
        reason: String,
    },
}

impl CycleOutcome {
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Settles when the cycle's stream has been fully drained.
#[derive(Debug)]
pub enum Completion {
    Pending(JoinHandle<CycleOutcome>),
    Ready(CycleOutcome),
}

impl Completion {
    pub async fn wait(self) -> CycleOutcome {
        match self {
            Self::Ready(outcome) => outcome,
            Self::Pending(task) => task.await.unwrap_or_else(|e| CycleOutcome::Failed {
                reason: format!("reply task aborted: {e}"),
            }),
        }
    }
}

/// Result of a resolved submission.
#[derive(Debug)]
pub struct Submission {
    pub user: DisplayEntry,
    /// Live stream-backed entry on success, static notice on failure.
    pub reply: DisplayEntry,
    pub completion: Completion,
}

impl Submission {
    pub async fn finished(self) -> CycleOutcome {
        self.completion.wait().await
    }
}

struct Log {
    state: ConversationState,
    display: DisplayState,
}

struct Inner<P, S> {
    provider: P,
    store: S,
    credentials: CredentialPool,
    selector: Arc<dyn CredentialSelector>,
    config: ConversationConfig,
    context: SessionContext,
    log: Mutex<Log>,
    cycle: Arc<tokio::sync::Mutex<()>>,
}

/// Owns the conversation log of one session and drives submissions.
///
/// At most one cycle runs at a time; a second `begin` while one is in flight
/// fails with [`ConversationError::CycleInFlight`] instead of interleaving
/// turns.
pub struct SessionController<P = Arc<dyn LLMProvider>, S = Arc<dyn ChatStore>> {
    inner: Arc<Inner<P, S>>,
}

impl<P, S> Clone for SessionController<P, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub struct SessionControllerBuilder<P, S> {
    provider: P,
    store: S,
    credentials: CredentialPool,
    selector: Arc<dyn CredentialSelector>,
    config: ConversationConfig,
    context: SessionContext,
}

impl<P, S> SessionControllerBuilder<P, S>
where
    P: LLMProvider + 'static,
    S: ChatStore + 'static,
{
    #[must_use]
    pub fn selector(mut self, selector: Arc<dyn CredentialSelector>) -> Self {
        self.selector = selector;
        self
    }

    #[must_use]
    pub fn config(mut self, config: ConversationConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn context(mut self, context: SessionContext) -> Self {
        self.context = context;
        self
    }

    /// Start with an empty log.
    #[must_use]
    pub fn build(self) -> SessionController<P, S> {
        let state = ConversationState::new(self.context.session_id.clone());
        self.finish(state)
    }

    /// Reopen the session: load its record, if any, and rebuild the display
    /// list from the stored turns.
    ///
    /// Records are only read when an owner is set. A record owned by someone
    /// else is never restored or overwritten: opening it fails with
    /// [`ConversationError::NotOwner`].
    pub async fn open(mut self) -> Result<SessionController<P, S>, ConversationError> {
        let session_id = self.context.session_id.clone();
        let Some(owner) = self.context.owner.clone() else {
            debug!("No session owner, starting {session_id} empty");
            return Ok(self.build());
        };

        let state = match self.store.load(&session_id).await? {
            Some(record) if record.user_id == owner => {
                info!(
                    "Reopened session {session_id}: {} turns",
                    record.turns.len()
                );
                self.context.created_at = record.created_at;
                record.to_state()
            }
            Some(_) => {
                warn!("Refusing to open session {session_id}: owned by another user");
                return Err(ConversationError::NotOwner(session_id));
            }
            None => ConversationState::new(session_id),
        };

        Ok(self.finish(state))
    }

    fn finish(self, state: ConversationState) -> SessionController<P, S> {
        let display = DisplayState::rehydrate(&state);
        SessionController {
            inner: Arc::new(Inner {
                provider: self.provider,
                store: self.store,
                credentials: self.credentials,
                selector: self.selector,
                config: self.config,
                context: self.context,
                log: Mutex::new(Log { state, display }),
                cycle: Arc::new(tokio::sync::Mutex::new(())),
            }),
        }
    }
}

impl<P, S> SessionController<P, S>
where
    P: LLMProvider + 'static,
    S: ChatStore + 'static,
{
    pub fn builder(
        provider: P,
        store: S,
        credentials: CredentialPool,
    ) -> SessionControllerBuilder<P, S> {
        SessionControllerBuilder {
            provider,
            store,
            credentials,
            selector: Arc::new(RandomSelector),
            config: ConversationConfig::default(),
            context: SessionContext::generate(),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.inner.context.session_id
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.inner.context
    }

    /// Snapshot of the durable log.
    #[must_use]
    pub fn state(&self) -> ConversationState {
        self.inner.lock_log().state.clone()
    }

    /// Snapshot of the display list.
    #[must_use]
    pub fn display(&self) -> Vec<DisplayEntry> {
        self.inner.lock_log().display.entries().to_vec()
    }

    /// Whether a cycle is currently running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.cycle.try_lock().is_err()
    }

    /// Submit `text` and wait until the reply has started streaming or the
    /// call has failed.
    ///
    /// Whitespace-only input is ignored: returns `Ok(None)` without touching
    /// the log or calling the model.
    pub async fn submit(&self, text: &str) -> Result<Option<Submission>, ConversationError> {
        match self.begin(text)? {
            Some(pending) => Ok(Some(pending.resolve().await)),
            None => Ok(None),
        }
    }

    /// Synchronous first phase of [`submit`](Self::submit).
    ///
    /// Appends the user turn and pushes the user and live entries onto the
    /// display list before returning. Nothing is sent until the returned
    /// cycle is resolved.
    pub fn begin(&self, text: &str) -> Result<Option<PendingCycle<P, S>>, ConversationError> {
        if text.trim().is_empty() {
            debug!("Ignoring empty submission");
            return Ok(None);
        }

        let permit = Arc::clone(&self.inner.cycle)
            .try_lock_owned()
            .map_err(|_| ConversationError::CycleInFlight(self.session_id().to_string()))?;

        let mut log = self.inner.lock_log();
        let turn = Turn::user(text);
        let user = log.display.push_user(&turn);
        log.state.append(turn);

        let (handle, reader) = stream_channel();
        let live = log.display.push_live(reader);
        let messages = self.inner.context_messages(&log.state);
        drop(log);

        debug!(
            "Turn appended to session {}, {} messages in context",
            self.session_id(),
            messages.len()
        );

        Ok(Some(PendingCycle {
            inner: Arc::clone(&self.inner),
            user,
            live,
            handle,
            messages,
            permit,
        }))
    }
}

/// A submission whose user turn is recorded but whose model call has not
/// been made yet.
///
/// Dropping it without resolving releases the session and fails the live
/// entry; the user turn stays in the log.
pub struct PendingCycle<P, S> {
    inner: Arc<Inner<P, S>>,
    user: DisplayEntry,
    live: DisplayEntry,
    handle: StreamHandle,
    messages: Vec<ChatMessage>,
    permit: OwnedMutexGuard<()>,
}

impl<P, S> PendingCycle<P, S>
where
    P: LLMProvider + 'static,
    S: ChatStore + 'static,
{
    #[must_use]
    pub const fn user_entry(&self) -> &DisplayEntry {
        &self.user
    }

    #[must_use]
    pub const fn live_entry(&self) -> &DisplayEntry {
        &self.live
    }

    /// Open the model stream under the retry policy.
    pub async fn resolve(self) -> Submission {
        let Self {
            inner,
            user,
            live,
            handle,
            messages,
            permit,
        } = self;

        debug!(
            "Opening {} stream for session {}, giving up after at most {}ms",
            inner.provider.model(),
            inner.context.session_id,
            inner.config.retry.worst_case().as_millis()
        );

        let result = {
            let shared = &*inner;
            let messages = &messages;
            shared
                .config
                .retry
                .execute(|| {
                    let credential = shared.selector.select(&shared.credentials);
                    shared.provider.open_stream(credential, messages)
                })
                .await
        };

        match result {
            Ok(stream) => {
                info!(
                    "Reply streaming for session {} from {}",
                    inner.context.session_id,
                    inner.provider.model()
                );
                let task = tokio::spawn(drive(
                    Arc::clone(&inner),
                    stream,
                    handle,
                    live.id.clone(),
                    permit,
                ));
                Submission {
                    user,
                    reply: live,
                    completion: Completion::Pending(task),
                }
            }
            Err(e) => {
                let reason = e.to_string();
                let notice = inner.fail_cycle(&live.id, &reason, handle);
                drop(permit);
                Submission {
                    user,
                    reply: notice,
                    completion: Completion::Ready(CycleOutcome::Failed { reason }),
                }
            }
        }
    }
}

/// Drain the provider stream into the live entry, then settle the cycle.
async fn drive<P, S>(
    inner: Arc<Inner<P, S>>,
    mut stream: CompletionStream,
    handle: StreamHandle,
    live_id: String,
    _permit: OwnedMutexGuard<()>,
) -> CycleOutcome
where
    P: LLMProvider,
    S: ChatStore,
{
    let mut streamed = String::new();
    let idle = inner.config.idle_timeout;

    loop {
        let event = match timeout(idle, stream.next()).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(_) => {
                let reason = format!("no reply data for {}ms", idle.as_millis());
                inner.fail_cycle(&live_id, &reason, handle);
                return CycleOutcome::Failed { reason };
            }
        };

        match event {
            Ok(StreamEvent::Delta(delta)) => {
                streamed.push_str(&delta);
                handle.update(&delta);
            }
            Ok(StreamEvent::Done(full)) => {
                if full != streamed {
                    warn!(
                        "Final text differs from streamed deltas ({} vs {} chars)",
                        full.chars().count(),
                        streamed.chars().count()
                    );
                }
                return inner.complete_cycle(full, handle).await;
            }
            Err(e) => {
                let reason = e.to_string();
                inner.fail_cycle(&live_id, &reason, handle);
                return CycleOutcome::Failed { reason };
            }
        }
    }

    let reason = "stream ended before completion".to_string();
    inner.fail_cycle(&live_id, &reason, handle);
    CycleOutcome::Failed { reason }
}

impl<P, S> Inner<P, S>
where
    P: LLMProvider,
    S: ChatStore,
{
    fn lock_log(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn context_messages(&self, state: &ConversationState) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(state.len() + 1);
        if let Some(prompt) = &self.config.system_prompt {
            messages.push(ChatMessage {
                role: Role::System,
                content: prompt.clone(),
            });
        }
        messages.extend(state.messages());
        messages
    }

    async fn complete_cycle(&self, reply: String, handle: StreamHandle) -> CycleOutcome {
        handle.done();

        let record = {
            let mut log = self.lock_log();
            log.state.append(Turn::assistant(reply.clone()));
            self.context.owner.as_ref().map(|owner| {
                ChatRecord::from_state(&log.state, owner.clone(), self.context.created_at)
            })
        };

        let persisted = match record {
            Some(record) => self.persist(&record).await,
            None => {
                debug!("No session owner, skipping persistence");
                false
            }
        };

        CycleOutcome::Completed { reply, persisted }
    }

    /// Best effort: failures are logged and otherwise ignored.
    async fn persist(&self, record: &ChatRecord) -> bool {
        match self.store.save(record).await {
            Ok(()) => {
                info!("Saved chat {} ({} turns)", record.id, record.turns.len());
                true
            }
            Err(e) => {
                warn!("Failed to save chat {}: {e}", record.id);
                false
            }
        }
    }

    /// Record a system turn for the failure and replace the live entry with
    /// a static notice.
    fn fail_cycle(&self, live_id: &str, reason: &str, handle: StreamHandle) -> DisplayEntry {
        warn!(
            "Submission failed for session {}: {reason}",
            self.context.session_id
        );
        handle.fail(reason);

        let notice = DisplayEntry::notice(ERROR_NOTICE);
        let mut log = self.lock_log();
        log.state
            .append(Turn::system(format!("{ERROR_TURN_PREFIX}: {reason}. Please try again.")));
        log.display.replace(live_id, notice.clone());
        notice
    }
}

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

//! Multi-turn conversation sessions with streamed replies.
//!
//! # Key Features
//! - Append-only conversation log owned by one controller per session
//! - Replies streamed into live display entries as deltas arrive
//! - Retries with per-attempt timeouts and per-attempt credential choice
//! - Display list rebuilt from the stored log when a session is reopened

mod controller;
mod display;
mod stream;

pub use controller::{
    Completion, ConversationConfig, ConversationError, CycleOutcome, DEFAULT_IDLE_TIMEOUT,
    ERROR_NOTICE, ERROR_TURN_PREFIX, PendingCycle, SessionContext, SessionController,
    SessionControllerBuilder, Submission,
};
pub use display::{DisplayContent, DisplayEntry, DisplayState, EntryKind, reconstruct};
pub use stream::{StreamHandle, StreamReader, StreamStatus, stream_channel};

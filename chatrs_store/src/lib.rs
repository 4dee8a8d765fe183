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

//! Durable storage for conversation records.
//!
//! [`SqlChatStore`] keeps one row per session in a `chats` table;
//! [`MemoryChatStore`] holds records in process for ephemeral sessions.

pub mod entity;
mod memory;
mod sql;

pub use memory::MemoryChatStore;
pub use sql::SqlChatStore;

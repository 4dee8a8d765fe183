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

//! Model providers and the resilient-call plumbing around them.

mod openai;
pub mod retry;
mod selector;

pub use openai::{DEFAULT_BASE_URL, OpenAiProvider, SseBuffer};
pub use retry::{AttemptError, RetryError, RetryPolicy, retry_with_timeout};
pub use selector::{RandomSelector, RoundRobinSelector};

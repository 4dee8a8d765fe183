//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy type with its own input, dispatched
//! statically from `main`.

use chatrs_config::Config;
use chatrs_conversation::{ConversationConfig, DisplayEntry, EntryKind};
use chatrs_core::CredentialPool;
use chatrs_providers::{OpenAiProvider, RetryPolicy};
use chatrs_store::SqlChatStore;
use tracing::debug;

mod chat;
mod history;
mod info;
mod init;
mod remove;
mod sessions;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use history::HistoryStrategy;
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use remove::RemoveStrategy;
pub use sessions::SessionsStrategy;
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
///
/// Each strategy defines its own input type via the associated type, so
/// parameters are passed without runtime casting or boxing.
pub trait CommandStrategy: Send + Sync + 'static {
    type Input;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

fn build_provider(config: &Config, model: Option<String>) -> OpenAiProvider {
    let provider = &config.provider;
    let model = model.unwrap_or_else(|| provider.model.clone());
    debug!("Using model {model} at {}", provider.base_url);
    OpenAiProvider::new(model)
        .with_base_url(provider.base_url.clone())
        .with_max_tokens(provider.max_tokens)
        .with_temperature(provider.temperature)
}

fn build_credentials(config: &Config) -> anyhow::Result<CredentialPool> {
    CredentialPool::from_keys(config.api_keys())
}

fn build_conversation_config(config: &Config) -> ConversationConfig {
    let retry = RetryPolicy::new(
        config.retry.attempts,
        config.retry.timeout(),
        config.retry.backoff(),
    );
    let conversation = ConversationConfig::default()
        .with_retry(retry)
        .with_idle_timeout(config.retry.idle_timeout());
    match &config.provider.system_prompt {
        Some(prompt) => conversation.with_system_prompt(prompt.clone()),
        None => conversation,
    }
}

async fn open_store(config: &Config) -> anyhow::Result<SqlChatStore> {
    Config::ensure_config_dir()?;
    SqlChatStore::new(&config.store.url).await
}

/// The configured user, required by commands that read stored sessions.
fn require_owner(config: &Config) -> anyhow::Result<&str> {
    config.user.id.as_deref().ok_or_else(|| {
        anyhow::anyhow!("No user configured. Set user.id in config.json or CHATRS_USER_ID.")
    })
}

fn format_entry(entry: &DisplayEntry) -> String {
    let label = match entry.kind {
        EntryKind::User => "you",
        EntryKind::Assistant => "assistant",
        EntryKind::Notice => "notice",
    };
    format!("[{label}] {}\n", entry.content.text())
}

fn print_entry(entry: &DisplayEntry) {
    println!("{}", format_entry(entry));
}

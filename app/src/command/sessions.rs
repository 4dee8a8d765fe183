use chatrs_config::Config;
use chatrs_core::ChatStore;

use super::{open_store, require_owner};

/// Strategy for listing the configured user's stored sessions, newest first.
#[derive(Debug, Clone, Copy)]
pub struct SessionsStrategy;

impl super::CommandStrategy for SessionsStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let owner = require_owner(&config)?;
        let store = open_store(&config).await?;

        let sessions = store.list(owner).await?;
        if sessions.is_empty() {
            println!("No stored sessions for {owner}");
            return Ok(());
        }

        for summary in sessions {
            println!(
                "{}  {}  {}",
                summary.id,
                summary.created_at.format("%Y-%m-%d %H:%M"),
                summary.title
            );
        }
        Ok(())
    }
}

use chatrs_config::Config;
use chatrs_conversation::reconstruct;
use chatrs_core::ChatStore;

use super::{open_store, print_entry, require_owner};

/// Strategy for printing a stored conversation the way a reopened session
/// would show it.
#[derive(Debug, Clone, Copy)]
pub struct HistoryStrategy;

impl super::CommandStrategy for HistoryStrategy {
    type Input = String;

    async fn execute(&self, id: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let owner = require_owner(&config)?;
        let store = open_store(&config).await?;

        let record = match store.load(&id).await? {
            Some(record) if record.user_id == owner => record,
            _ => {
                println!("No stored session {id}");
                return Ok(());
            }
        };

        println!(
            "=== {} ({}) ===\n",
            record.title,
            record.created_at.format("%Y-%m-%d %H:%M")
        );
        for entry in reconstruct(&record.to_state()) {
            print_entry(&entry);
        }
        Ok(())
    }
}

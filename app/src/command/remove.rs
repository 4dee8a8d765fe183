use chatrs_config::Config;
use chatrs_core::ChatStore;
use tracing::info;

use super::{open_store, require_owner};

#[derive(Debug, Clone, Copy)]
pub struct RemoveStrategy;

impl super::CommandStrategy for RemoveStrategy {
    type Input = String;

    async fn execute(&self, id: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let owner = require_owner(&config)?;
        let store = open_store(&config).await?;

        match store.load(&id).await? {
            Some(record) if record.user_id == owner => {
                store.remove(&id).await?;
                info!("Removed session {id}");
                println!("Removed session {id}");
            }
            _ => println!("No stored session {id}"),
        }
        Ok(())
    }
}

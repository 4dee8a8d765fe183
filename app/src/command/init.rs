use chatrs_config::Config;

/// Strategy for writing the configuration template to `~/chatrs/config.json`.
#[derive(Debug, Clone, Copy)]
pub struct InitStrategy;

impl super::CommandStrategy for InitStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let path = Config::create_config()?;
        println!("Created config at {}", path.display());
        println!("Add your API keys under provider.api_keys before chatting.");
        Ok(())
    }
}

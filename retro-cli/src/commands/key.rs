//! `retrorestore key set|status|clear`

use anyhow::{Context, Result};
use clap::Subcommand;

use retro_client::credentials::API_KEY_VARS;
use retro_client::{ApiKey, FileCredentials};

#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// Prompt for an API key and store it (mode 0600).
    Set,
    /// Report where the API key would come from, without printing it.
    Status,
    /// Delete the stored API key.
    Clear,
}

pub fn run(cmd: KeyCommand) -> Result<()> {
    let home = super::home()?;
    let file = FileCredentials::at(&home);

    match cmd {
        KeyCommand::Set => {
            let raw = super::prompt_line("Gemini API key: ").context("failed to read API key")?;
            let key = ApiKey::new(raw).context("API key must not be blank")?;
            let path = file.store(&key).context("failed to store API key")?;
            println!("API key stored in {}", path.display());
        }
        KeyCommand::Status => {
            let env_var = API_KEY_VARS
                .iter()
                .find(|var| std::env::var(var).ok().and_then(ApiKey::new).is_some());
            if let Some(var) = env_var {
                println!("API key: from environment ({var})");
            } else if file.load().context("failed to read stored API key")?.is_some() {
                println!("API key: stored in {}", file.path().display());
            } else {
                println!("API key: not set (run `retrorestore key set`)");
            }
        }
        KeyCommand::Clear => {
            if file.clear().context("failed to remove stored API key")? {
                println!("stored API key removed");
            } else {
                println!("no stored API key");
            }
        }
    }
    Ok(())
}

//! `retrorestore config show` and `retrorestore config init`

use anyhow::{Context, Result};
use clap::Subcommand;

use retro_core::{config, RestoreConfig};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration (file plus environment overrides).
    Show,

    /// Write a config file with default values.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
}

pub fn run(cmd: ConfigCommand) -> Result<()> {
    let home = super::home()?;
    match cmd {
        ConfigCommand::Show => {
            let effective = super::load_config(&home)?;
            let yaml = serde_yaml::to_string(&effective).context("failed to render config")?;
            println!("# {}", config::config_path_at(&home).display());
            print!("{yaml}");
        }
        ConfigCommand::Init { force } => {
            let path = config::config_path_at(&home);
            if path.exists() && !force {
                println!("config already exists: {} (use --force to overwrite)", path.display());
                return Ok(());
            }
            let path = config::save_at(&home, &RestoreConfig::default())
                .context("failed to write config")?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

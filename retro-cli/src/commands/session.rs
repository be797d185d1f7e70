//! `retrorestore session`: interactive command loop on stdin/stdout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::BufReader;

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Default directory for `download`.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// Maximum simultaneous requests (default: all at once).
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Use this API key instead of the environment or the stored key.
    #[arg(long, env = "RETRORESTORE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl SessionArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let config = super::load_config(&home)?;
        let out_dir = self.out.unwrap_or_else(|| config.output_dir_or_default());
        // The session owns stdin, so a missing key is reported rather than prompted for.
        let credentials = super::credentials(&home, self.api_key.as_deref(), false)?;
        let orch = super::orchestrator(&config, credentials, self.max_concurrency)?;

        super::runtime()?.block_on(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            retro_runtime::run_session(orch, stdin, tokio::io::stdout(), &out_dir)
                .await
                .context("session failed")
        })
    }
}

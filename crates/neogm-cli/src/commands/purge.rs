//! Whole-database purge, for resetting test databases.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use neogm_graph::{AccessMode, Driver, OgmConfig, Session};

#[derive(Args)]
pub struct PurgeArgs {
    /// Confirm that every node and relationship should be deleted
    #[arg(long)]
    pub yes: bool,
}

pub async fn execute(args: PurgeArgs, config: &OgmConfig) -> Result<()> {
    if !args.yes {
        anyhow::bail!("refusing to purge {} without --yes", config.uri);
    }

    let client = super::connect(config).await?;
    let conn = client.open(AccessMode::Write).await?;
    let mut session = Session::new(conn, Default::default());
    session.purge_database().await?;
    session.close().await?;

    println!("{} {}", "Purged".red().bold(), config.uri);
    Ok(())
}

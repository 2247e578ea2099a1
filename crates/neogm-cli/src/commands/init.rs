//! Apply the configured index strategy.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use neogm_graph::{Ogm, OgmConfig};

#[derive(Args)]
pub struct InitArgs {
    /// TOML file declaring the mapped types
    #[arg(long)]
    pub schema: PathBuf,
}

pub async fn execute(args: InitArgs, config: OgmConfig) -> Result<()> {
    let registry = super::load_registry(&args.schema)?;
    let client = super::connect(&config).await?;
    let strategy = config.index_strategy;

    let ogm = Ogm::with_driver(client, config, registry).await?;
    println!(
        "{} {} types with index strategy {}",
        "Initialized".green().bold(),
        ogm.registry().len(),
        format!("{:?}", strategy).to_lowercase().cyan()
    );
    Ok(())
}

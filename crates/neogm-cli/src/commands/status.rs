//! Database status command.

use anyhow::Result;
use colored::Colorize;

use neogm_graph::OgmConfig;

pub async fn execute(config: &OgmConfig) -> Result<()> {
    let client = super::connect(config).await?;
    let counts = client.get_counts().await?;

    println!("{}", "Graph Status".bold());
    println!("{}", "─".repeat(40));
    println!("  {:<16} {}", "URI:", config.uri.cyan());
    println!("  {:<16} {}", "Database:", config.database);
    println!("  {:<16} {}", "Nodes:", counts.nodes);
    println!("  {:<16} {}", "Relationships:", counts.relationships);
    Ok(())
}

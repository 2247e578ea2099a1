//! Schema CLI commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use neogm_core::OgmError;
use neogm_graph::{OgmConfig, SchemaReconciler};

use crate::output;

#[derive(Subcommand)]
pub enum SchemaCommands {
    /// Create the constraints and indexes the schema file declares
    Create {
        /// TOML file declaring the mapped types
        #[arg(long)]
        schema: PathBuf,
    },

    /// Drop every constraint and index in the database
    Drop,

    /// Check the database against the schema file without changing it
    Verify {
        /// TOML file declaring the mapped types
        #[arg(long)]
        schema: PathBuf,
    },
}

pub async fn execute(cmd: SchemaCommands, config: &OgmConfig) -> Result<()> {
    let registry = match &cmd {
        SchemaCommands::Create { schema } | SchemaCommands::Verify { schema } => super::load_registry(schema)?,
        SchemaCommands::Drop => Default::default(),
    };

    let client = super::connect(config).await?;
    let reconciler = SchemaReconciler::new(&client, Arc::new(registry));

    match cmd {
        SchemaCommands::Create { .. } => {
            let created = reconciler.create_all().await?;
            println!("{} {} constraints and indexes", "Created".green().bold(), created);
        }
        SchemaCommands::Drop => {
            let dropped = reconciler.drop_all().await?;
            println!("{} {} constraints and indexes", "Dropped".yellow().bold(), dropped);
        }
        SchemaCommands::Verify { .. } => match reconciler.verify_all().await {
            Ok(()) => println!("{}", "Schema matches the declared types.".green()),
            Err(OgmError::SchemaDrift(deltas)) => {
                deltas.iter().for_each(output::print_schema_delta);
                let categories: Vec<String> = deltas.iter().map(|delta| delta.category.to_string()).collect();
                anyhow::bail!("schema drift detected in {}", categories.join(" and "));
            }
            Err(e) => return Err(e.into()),
        },
    }

    Ok(())
}

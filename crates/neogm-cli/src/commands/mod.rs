//! CLI command definitions and handlers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::debug;

use neogm_core::{TypeRegistry, TypeSchemaConfig};
use neogm_graph::{GraphClient, OgmConfig};

pub mod init;
pub mod purge;
pub mod query;
pub mod schema;
pub mod status;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "neogm.toml";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// NeoGM - object-graph mapping for Neo4j
#[derive(Parser)]
#[command(name = "neogm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the connection config (defaults to ./neogm.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply the configured index strategy to the database
    Init(init::InitArgs),

    /// Create, drop or verify constraints and indexes
    #[command(subcommand)]
    Schema(schema::SchemaCommands),

    /// Execute a Cypher query and print the rows as JSON
    Query(query::QueryArgs),

    /// Delete every node and relationship in the database
    Purge(purge::PurgeArgs),

    /// Show node and relationship counts
    Status,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;

        match self.command {
            Commands::Init(args) => init::execute(args, config).await,
            Commands::Schema(cmd) => schema::execute(cmd, &config).await,
            Commands::Query(args) => query::execute(args, &config).await,
            Commands::Purge(args) => purge::execute(args, &config).await,
            Commands::Status => status::execute(&config).await,
        }
    }
}

/// Declared types, as written in a schema file:
///
/// ```toml
/// [[types]]
/// name = "Person"
/// label = "Person"
/// fields = [
///     { name = "id", unique = true },
///     { name = "age", index = true },
/// ]
/// ```
#[derive(Debug, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub types: Vec<TypeSchemaConfig>,
}

impl SchemaFile {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid schema file")
    }
}

pub fn load_registry(path: &Path) -> Result<TypeRegistry> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {}", path.display()))?;
    let file = SchemaFile::parse(&text)?;
    TypeRegistry::from_configs(file.types)
        .with_context(|| format!("Invalid type declarations in {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<OgmConfig> {
    let config = match path {
        Some(path) => OgmConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => OgmConfig::from_file(DEFAULT_CONFIG_FILE)
            .with_context(|| format!("Failed to load config {}", DEFAULT_CONFIG_FILE))?,
        None => OgmConfig::default(),
    }
    .apply_env();

    config.validate()?;
    debug!(uri = %config.uri, database = %config.database, "Configuration loaded");
    Ok(config)
}

/// Connect with a timeout so an unreachable server fails fast.
pub async fn connect(config: &OgmConfig) -> Result<GraphClient> {
    tokio::time::timeout(CONNECT_TIMEOUT, GraphClient::connect(config))
        .await
        .with_context(|| format!("Timed out connecting to {}", config.uri))?
        .with_context(|| format!("Failed to connect to {}", config.uri))
}

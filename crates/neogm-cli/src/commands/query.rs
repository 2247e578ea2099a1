//! Raw query command.

use anyhow::{Context, Result};
use clap::Args;

use neogm_core::Params;
use neogm_graph::{AccessMode, Driver, OgmConfig, Session};

use crate::output;

#[derive(Args)]
pub struct QueryArgs {
    /// Cypher query string
    pub cypher: String,

    /// Query parameter as key=value; the value is parsed as JSON, falling
    /// back to a plain string
    #[arg(short, long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Run in a read-only transaction
    #[arg(long)]
    pub read: bool,
}

pub async fn execute(args: QueryArgs, config: &OgmConfig) -> Result<()> {
    let params = parse_params(&args.params)?;
    let client = super::connect(config).await?;
    let conn = client.open(AccessMode::from_readonly(args.read)).await?;
    let mut session = Session::new(conn, Default::default());

    session.begin(args.read).await?;
    let outcome = session.query_raw(&args.cypher, &params).await;
    let result = session.finish_transaction(outcome).await?;
    session.close().await?;

    output::print_rows(&result);
    Ok(())
}

fn parse_params(raw: &[String]) -> Result<Params> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Parameter '{}' is not KEY=VALUE", pair))?;
            let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::from(value));
            Ok::<_, anyhow::Error>((key.trim().to_string(), value))
        })
        .collect()
}

//! Terminal output formatting.

use colored::Colorize;
use serde_json::Value;

use neogm_core::SchemaDelta;
use neogm_graph::QueryResult;

/// Print the column header, then one JSON array per row.
pub fn print_rows(result: &QueryResult) {
    if result.is_empty() {
        println!("{}", "No results.".dimmed());
        return;
    }

    println!("{}", result.columns.join(" | ").bold());
    for (i, row) in result.rows.iter().enumerate() {
        println!("{}: {}", (i + 1).to_string().dimmed(), Value::Array(row.clone()));
    }
    println!("\n{} rows", result.rows.len().to_string().bold());
}

/// Print what the database is missing and what it has in excess.
pub fn print_schema_delta(delta: &SchemaDelta) {
    println!("{} {}", "Schema drift in".red().bold(), delta.category.to_string().bold());
    for item in &delta.missing {
        println!("  {} {}", "missing".red(), item);
    }
    for item in &delta.unexpected {
        println!("  {} {}", "unexpected".yellow(), item);
    }
}

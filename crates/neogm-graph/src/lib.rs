//! # NeoGM Graph
//!
//! The database-facing half of NeoGM: sessions that load, save and delete
//! registered node types over Neo4j, and the schema reconciler that keeps
//! declared constraints and indexes in sync with the database.

pub mod client;
pub mod config;
pub mod connection;
pub mod decode;
pub mod load_strategy;
pub mod ogm;
pub mod persist;
pub mod schema;
pub mod session;

#[cfg(test)]
mod mock;

pub use client::{GraphClient, GraphCounts, Neo4jConnection};
pub use config::{IndexStrategy, OgmConfig};
pub use connection::{AccessMode, Connection, Driver, QueryResult};
pub use load_strategy::{LoadScope, LoadStrategy};
pub use ogm::Ogm;
pub use persist::SaveSummary;
pub use schema::SchemaReconciler;
pub use session::{Session, SessionState, DEFAULT_DEPTH};

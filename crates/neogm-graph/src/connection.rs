//! Connection adapter traits.
//!
//! Sessions and the schema reconciler only ever talk to the database
//! through these traits, so any Bolt driver (or a test double) can sit
//! underneath them.

use async_trait::async_trait;
use serde_json::Value;

use neogm_core::{OgmResult, Params};

/// Access mode requested when opening a connection or a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    Read,
    #[default]
    Write,
}

impl AccessMode {
    pub fn from_readonly(readonly: bool) -> Self {
        if readonly {
            Self::Read
        } else {
            Self::Write
        }
    }
}

/// Rows returned by a statement, column values in projection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn new(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of a named column in `row`.
    pub fn value<'r>(&self, row: &'r [Value], name: &str) -> Option<&'r Value> {
        self.column_index(name).and_then(|idx| row.get(idx))
    }
}

/// One exclusive database connection.
///
/// Statements run inside the open transaction when there is one and
/// auto-commit otherwise.
#[async_trait]
pub trait Connection: Send {
    async fn begin(&mut self, mode: AccessMode) -> OgmResult<()>;

    async fn commit(&mut self) -> OgmResult<()>;

    async fn rollback(&mut self) -> OgmResult<()>;

    async fn query_raw(&mut self, cypher: &str, params: &Params) -> OgmResult<QueryResult>;

    /// Release the connection, discarding any open transaction.
    async fn close(&mut self) -> OgmResult<()>;
}

/// Source of connections.
#[async_trait]
pub trait Driver: Send + Sync {
    type Conn: Connection;

    async fn open(&self, mode: AccessMode) -> OgmResult<Self::Conn>;
}

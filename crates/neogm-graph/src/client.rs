//! Neo4j driver adapter over neo4rs.

use std::collections::BTreeSet;

use async_trait::async_trait;
use neo4rs::{
    BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, Graph,
    Query, Row, Txn,
};
use serde_json::{Map, Value};
use tracing::{debug, info};

use neogm_core::{OgmError, OgmResult, Params};

use crate::config::OgmConfig;
use crate::connection::{AccessMode, Connection, Driver, QueryResult};

/// Pooled Neo4j client. Cheap to clone; every session opens its own
/// [`Neo4jConnection`] from it.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Build the pool and ping the server.
    ///
    /// neo4rs creates its pool lazily, so `Graph::connect` succeeds even when
    /// the server is down. The `RETURN 1` forces a real handshake so an
    /// unreachable server fails here instead of on the first statement.
    pub async fn connect(config: &OgmConfig) -> OgmResult<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| OgmError::Config(format!("failed to build neo4j config: {}", e)))?;

        let graph = Graph::connect(neo4j_config)
            .await
            .map_err(|e| OgmError::connection(format!("failed to create connection pool: {}", e)))?;

        graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .map_err(|e| OgmError::connection(format!("neo4j is not responding to queries: {}", e)))?;

        info!(uri = %config.uri, database = %config.database, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Node and relationship totals, for status display.
    pub async fn get_counts(&self) -> OgmResult<GraphCounts> {
        let mut conn = self.open(AccessMode::Read).await?;
        let nodes = count(&mut conn, "MATCH (n) RETURN count(n) AS count").await?;
        let relationships = count(&mut conn, "MATCH ()-[r]->() RETURN count(r) AS count").await?;
        conn.close().await?;
        Ok(GraphCounts { nodes, relationships })
    }
}

async fn count(conn: &mut Neo4jConnection, cypher: &str) -> OgmResult<usize> {
    let result = conn.query_raw(cypher, &Params::new()).await?;
    Ok(result
        .rows
        .first()
        .and_then(|row| row.first())
        .and_then(Value::as_u64)
        .unwrap_or(0) as usize)
}

/// Node and relationship counts.
#[derive(Debug, Clone)]
pub struct GraphCounts {
    pub nodes: usize,
    pub relationships: usize,
}

#[async_trait]
impl Driver for GraphClient {
    type Conn = Neo4jConnection;

    async fn open(&self, mode: AccessMode) -> OgmResult<Neo4jConnection> {
        debug!(?mode, "Opening connection");
        Ok(Neo4jConnection {
            graph: self.graph.clone(),
            txn: None,
        })
    }
}

/// One session's view of the pool: auto-commit statements go straight to
/// the pool, statements inside a transaction go through the held [`Txn`].
pub struct Neo4jConnection {
    graph: Graph,
    txn: Option<Txn>,
}

impl Neo4jConnection {
    fn take_txn(&mut self) -> OgmResult<Txn> {
        self.txn
            .take()
            .ok_or_else(|| OgmError::TransactionState("no transaction is open".to_string()))
    }
}

#[async_trait]
impl Connection for Neo4jConnection {
    async fn begin(&mut self, mode: AccessMode) -> OgmResult<()> {
        if self.txn.is_some() {
            return Err(OgmError::TransactionState(
                "a transaction is already open on this connection".to_string(),
            ));
        }
        let txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| OgmError::connection(format!("failed to begin transaction: {}", e)))?;
        debug!(?mode, "Began transaction");
        self.txn = Some(txn);
        Ok(())
    }

    async fn commit(&mut self) -> OgmResult<()> {
        self.take_txn()?
            .commit()
            .await
            .map_err(|e| OgmError::query("commit", e))
    }

    async fn rollback(&mut self) -> OgmResult<()> {
        self.take_txn()?
            .rollback()
            .await
            .map_err(|e| OgmError::connection(format!("rollback failed: {}", e)))
    }

    async fn query_raw(&mut self, cypher: &str, params: &Params) -> OgmResult<QueryResult> {
        let query = params
            .iter()
            .fold(Query::new(cypher.to_string()), |query, (key, value)| {
                query.param(key, to_bolt(value))
            });

        let mut rows = Vec::new();
        match self.txn.as_mut() {
            Some(txn) => {
                let mut stream = txn.execute(query).await.map_err(|e| OgmError::query(cypher, e))?;
                while let Some(row) = stream
                    .next(txn.handle())
                    .await
                    .map_err(|e| OgmError::query(cypher, e))?
                {
                    rows.push(row);
                }
            }
            None => {
                let mut stream = self
                    .graph
                    .execute(query)
                    .await
                    .map_err(|e| OgmError::query(cypher, e))?;
                while let Some(row) = stream.next().await.map_err(|e| OgmError::query(cypher, e))? {
                    rows.push(row);
                }
            }
        }

        to_result(cypher, &rows)
    }

    async fn close(&mut self) -> OgmResult<()> {
        if let Some(txn) = self.txn.take() {
            debug!("Discarding open transaction on close");
            txn.rollback()
                .await
                .map_err(|e| OgmError::connection(format!("rollback on close failed: {}", e)))?;
        }
        Ok(())
    }
}

/// neo4rs hands rows back as maps, so the `RETURN` order is recovered from
/// the statement itself. When the projection cannot be read (`RETURN *`,
/// procedure calls) columns fall back to name order.
fn to_result(cypher: &str, rows: &[Row]) -> OgmResult<QueryResult> {
    let keys: BTreeSet<String> = match rows.first() {
        Some(row) => row
            .to::<Map<String, Value>>()
            .map_err(|e| OgmError::query("decode row", e))?
            .into_iter()
            .map(|(key, _)| key)
            .collect(),
        None => BTreeSet::new(),
    };

    let columns = match projection_columns(cypher) {
        Some(projected)
            if rows.is_empty()
                || (projected.len() == keys.len() && projected.iter().all(|column| keys.contains(column))) =>
        {
            projected
        }
        _ => keys.into_iter().collect(),
    };

    let rows = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| {
                    row.get::<Value>(column)
                        .map_err(|e| OgmError::query(format!("decode column '{}'", column), e))
                })
                .collect::<OgmResult<Vec<_>>>()
        })
        .collect::<OgmResult<Vec<_>>>()?;

    Ok(QueryResult { columns, rows })
}

/// Column names of the last top-level `RETURN` clause, in projection order.
/// An item is named by its `AS` alias, or by its expression text as Neo4j
/// does for unaliased items.
fn projection_columns(cypher: &str) -> Option<Vec<String>> {
    let upper = cypher.to_ascii_uppercase();
    let mask = top_level_mask(cypher);

    let start = *keyword_positions(&upper, &mask, "RETURN").last()? + "RETURN".len();
    let end = ["ORDER", "SKIP", "LIMIT", "UNION"]
        .iter()
        .flat_map(|keyword| keyword_positions(&upper, &mask, keyword))
        .filter(|&pos| pos > start)
        .min()
        .unwrap_or(cypher.len());

    let mut start = start;
    if let Some(&pos) = keyword_positions(&upper, &mask, "DISTINCT").iter().find(|&&pos| pos >= start) {
        if cypher[start..pos].trim().is_empty() {
            start = pos + "DISTINCT".len();
        }
    }

    let mut bounds = vec![start];
    bounds.extend((start..end).filter(|&i| mask[i] && cypher.as_bytes()[i] == b','));
    let mut columns = Vec::with_capacity(bounds.len());
    for (i, &from) in bounds.iter().enumerate() {
        let from = if i == 0 { from } else { from + 1 };
        let to = bounds.get(i + 1).copied().unwrap_or(end);
        let alias = keyword_positions(&upper[..to], &mask[..to], "AS")
            .into_iter()
            .filter(|&pos| pos >= from)
            .last();
        let name = match alias {
            Some(pos) => cypher[pos + 2..to].trim().trim_matches('`'),
            None => cypher[from..to].trim(),
        };
        if name.is_empty() || name == "*" {
            return None;
        }
        columns.push(name.to_string());
    }
    Some(columns)
}

/// Per byte: true when outside quotes and brackets.
fn top_level_mask(text: &str) -> Vec<bool> {
    let mut mask = Vec::with_capacity(text.len());
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    for &byte in text.as_bytes() {
        match quote {
            Some(q) => {
                if byte == q {
                    quote = None;
                }
                mask.push(false);
            }
            None => {
                match byte {
                    b'\'' | b'"' | b'`' => quote = Some(byte),
                    b'(' | b'[' | b'{' => depth += 1,
                    b')' | b']' | b'}' => depth -= 1,
                    _ => {}
                }
                mask.push(depth == 0 && !b"'\"`()[]{}".contains(&byte));
            }
        }
    }
    mask
}

/// Word-bounded, top-level occurrences of an upper-case `keyword`.
fn keyword_positions(upper: &str, mask: &[bool], keyword: &str) -> Vec<usize> {
    let (text, word) = (upper.as_bytes(), keyword.as_bytes());
    if text.len() < word.len() {
        return Vec::new();
    }
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    (0..=text.len() - word.len())
        .filter(|&i| {
            &text[i..i + word.len()] == word
                && mask[i..i + word.len()].iter().all(|top| *top)
                && (i == 0 || !is_word(text[i - 1]))
                && text.get(i + word.len()).map_or(true, |b| !is_word(*b))
        })
        .collect()
}

fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(BoltInteger::new(i)),
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or(f64::NAN))),
        },
        Value::String(s) => BoltType::String(BoltString::new(s)),
        Value::Array(items) => BoltType::List(BoltList::from(items.iter().map(to_bolt).collect::<Vec<_>>())),
        Value::Object(map) => {
            let mut bolt = BoltMap::with_capacity(map.len());
            for (key, value) in map {
                bolt.put(BoltString::new(key), to_bolt(value));
            }
            BoltType::Map(bolt)
        }
    }
}

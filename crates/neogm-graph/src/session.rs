//! Per-unit-of-work session over one exclusive connection.
//!
//! A session is not shared between concurrent callers and has no internal
//! locking. Statements issued while no transaction is open auto-commit;
//! multi-statement writes (saves) open their own transaction in that case.
//! A second transaction is never nested inside an open one.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use neogm_core::{Condition, Cypher, NodeEntity, OgmError, OgmResult, Pagination, Params, TypeRegistry};

use crate::connection::{AccessMode, Connection, QueryResult};
use crate::decode;
use crate::load_strategy::{self, LoadScope, LoadStrategy};
use crate::persist;

/// Depth used by the plain `load`/`save` calls.
pub const DEFAULT_DEPTH: i32 = 1;

const ROOT_VAR: &str = "n";

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InTransaction,
    Closed,
}

pub struct Session<C: Connection> {
    conn: Option<C>,
    state: SessionState,
    registry: Arc<TypeRegistry>,
    pub default_depth: i32,
    pub load_strategy: LoadStrategy,
}

impl<C: Connection> Session<C> {
    pub fn new(conn: C, registry: Arc<TypeRegistry>) -> Self {
        Self {
            conn: Some(conn),
            state: SessionState::Idle,
            registry,
            default_depth: DEFAULT_DEPTH,
            load_strategy: LoadStrategy::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    fn conn_mut(&mut self) -> OgmResult<&mut C> {
        self.conn
            .as_mut()
            .ok_or_else(|| OgmError::not_initialized("neo4j connection not initialized"))
    }

    // ── Transactions ──────────────────────────────────────────────

    pub async fn begin(&mut self, readonly: bool) -> OgmResult<()> {
        let state = self.state;
        let conn = self.conn_mut()?;
        if state == SessionState::InTransaction {
            return Err(OgmError::TransactionState(
                "a transaction is already open on this session".to_string(),
            ));
        }

        conn.begin(AccessMode::from_readonly(readonly)).await?;
        self.state = SessionState::InTransaction;
        debug!(readonly, "Transaction started");
        Ok(())
    }

    pub async fn commit(&mut self) -> OgmResult<()> {
        let conn = self.open_transaction()?;
        let result = conn.commit().await;
        self.state = SessionState::Idle;
        result
    }

    pub async fn rollback(&mut self) -> OgmResult<()> {
        let conn = self.open_transaction()?;
        let result = conn.rollback().await;
        self.state = SessionState::Idle;
        result
    }

    fn open_transaction(&mut self) -> OgmResult<&mut C> {
        let state = self.state;
        let conn = self.conn_mut()?;
        if state != SessionState::InTransaction {
            return Err(OgmError::TransactionState("no transaction is open".to_string()));
        }
        Ok(conn)
    }

    /// Roll back, keeping `original` as the error to report. If the rollback
    /// itself fails, both messages are combined.
    pub async fn rollback_with_error(&mut self, original: OgmError) -> OgmError {
        match self.rollback().await {
            Ok(()) => original,
            Err(rollback) => OgmError::Rollback {
                original: original.to_string(),
                rollback: rollback.to_string(),
            },
        }
    }

    /// Commit on success, roll back on failure.
    pub async fn finish_transaction<T>(&mut self, outcome: OgmResult<T>) -> OgmResult<T> {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => Err(self.rollback_with_error(err).await),
        }
    }

    /// Close the connection. Any open transaction is discarded.
    pub async fn close(&mut self) -> OgmResult<()> {
        let mut conn = self
            .conn
            .take()
            .ok_or_else(|| OgmError::not_initialized("neo4j connection not initialized"))?;
        if self.state == SessionState::InTransaction {
            warn!("Closing session with an open transaction");
        }
        self.state = SessionState::Closed;
        conn.close().await
    }

    // ── Loading ───────────────────────────────────────────────────

    pub async fn load<T: NodeEntity>(&mut self, target: &mut T, id: &str) -> OgmResult<()> {
        let depth = self.default_depth;
        self.load_depth_filter_pagination(target, id, depth, None, None, None)
            .await
    }

    pub async fn load_depth<T: NodeEntity>(&mut self, target: &mut T, id: &str, depth: i32) -> OgmResult<()> {
        self.load_depth_filter_pagination(target, id, depth, None, None, None)
            .await
    }

    pub async fn load_depth_filter<T: NodeEntity>(
        &mut self,
        target: &mut T,
        id: &str,
        depth: i32,
        filter: Option<&Condition>,
        params: Option<Params>,
    ) -> OgmResult<()> {
        self.load_depth_filter_pagination(target, id, depth, filter, params, None)
            .await
    }

    /// Load the `T` whose uuid is `id`, with its neighborhood up to `depth`
    /// hops. `uuid` is always bound to `id`; other caller params are kept.
    pub async fn load_depth_filter_pagination<T: NodeEntity>(
        &mut self,
        target: &mut T,
        id: &str,
        depth: i32,
        filter: Option<&Condition>,
        params: Option<Params>,
        pagination: Option<&Pagination>,
    ) -> OgmResult<()> {
        self.conn_mut()?;
        self.ensure_registered::<T>()?;

        let query = load_strategy::resolve(self.load_strategy, ROOT_VAR, T::LABEL, depth, filter, LoadScope::One)?;
        let query = paginate(query, pagination)?;

        let mut params = params.unwrap_or_default();
        params.insert("uuid".to_string(), Value::from(id));

        let result = self.run(&query, &params).await?;
        *target = decode::decode_one(&result, id)?;
        Ok(())
    }

    pub async fn load_all<T: NodeEntity>(&mut self, target: &mut Vec<T>) -> OgmResult<()> {
        let depth = self.default_depth;
        self.load_all_depth_filter_pagination(target, depth, None, None, None)
            .await
    }

    pub async fn load_all_depth<T: NodeEntity>(&mut self, target: &mut Vec<T>, depth: i32) -> OgmResult<()> {
        self.load_all_depth_filter_pagination(target, depth, None, None, None)
            .await
    }

    pub async fn load_all_depth_filter<T: NodeEntity>(
        &mut self,
        target: &mut Vec<T>,
        depth: i32,
        filter: Option<&Condition>,
        params: Option<Params>,
    ) -> OgmResult<()> {
        self.load_all_depth_filter_pagination(target, depth, filter, params, None)
            .await
    }

    /// Load every `T`, each with its neighborhood up to `depth` hops.
    pub async fn load_all_depth_filter_pagination<T: NodeEntity>(
        &mut self,
        target: &mut Vec<T>,
        depth: i32,
        filter: Option<&Condition>,
        params: Option<Params>,
        pagination: Option<&Pagination>,
    ) -> OgmResult<()> {
        self.conn_mut()?;
        self.ensure_registered::<T>()?;

        let query = load_strategy::resolve(self.load_strategy, ROOT_VAR, T::LABEL, depth, filter, LoadScope::Many)?;
        let query = paginate(query, pagination)?;

        let result = self.run(&query, &params.unwrap_or_default()).await?;
        *target = decode::decode_many(&result)?;
        Ok(())
    }

    /// Load every `T` within `[min_jumps, max_jumps]` hops of an
    /// `end_node_type` node whose `end_node_field` equals `edge_constraint`.
    #[allow(clippy::too_many_arguments)]
    pub async fn load_all_edge_constraint<T: NodeEntity>(
        &mut self,
        target: &mut Vec<T>,
        end_node_type: &str,
        end_node_field: &str,
        edge_constraint: Value,
        min_jumps: i32,
        max_jumps: i32,
        depth: i32,
        filter: Option<&Condition>,
    ) -> OgmResult<()> {
        self.conn_mut()?;
        self.ensure_registered::<T>()?;
        if !self.registry.contains_label(end_node_type) {
            return Err(OgmError::invalid_argument(format!(
                "end node type '{}' is not registered",
                end_node_type
            )));
        }

        let scope = LoadScope::EdgeConstraint {
            end_node_type,
            end_node_field,
            min_jumps,
            max_jumps,
        };
        let query = load_strategy::resolve(self.load_strategy, ROOT_VAR, T::LABEL, depth, filter, scope)?;

        let params = Params::from([(end_node_field.to_string(), edge_constraint)]);
        let result = self.run(&query, &params).await?;
        *target = decode::decode_many(&result)?;
        Ok(())
    }

    fn ensure_registered<T: NodeEntity>(&self) -> OgmResult<()> {
        match self.registry.get(T::TYPE_NAME) {
            Some(_) => Ok(()),
            None => Err(OgmError::invalid_argument(format!(
                "type '{}' is not registered",
                T::TYPE_NAME
            ))),
        }
    }

    // ── Writing ───────────────────────────────────────────────────

    pub async fn save<T: NodeEntity>(&mut self, obj: &T) -> OgmResult<()> {
        let depth = self.default_depth;
        self.save_depth(obj, depth).await
    }

    /// Upsert `obj` and the objects reachable from it within `depth` hops.
    pub async fn save_depth<T: NodeEntity>(&mut self, obj: &T, depth: i32) -> OgmResult<()> {
        self.conn_mut()?;
        self.ensure_registered::<T>()?;

        let owns_transaction = self.state == SessionState::Idle;
        if owns_transaction {
            self.begin(false).await?;
        }

        let outcome = persist::save_depth(self.conn_mut()?, obj, depth).await;
        let summary = if owns_transaction {
            self.finish_transaction(outcome).await?
        } else {
            outcome?
        };

        debug!(
            label = T::LABEL,
            nodes = summary.nodes,
            relationships = summary.relationships,
            "Saved object graph"
        );
        Ok(())
    }

    pub async fn delete<T: NodeEntity>(&mut self, obj: &T) -> OgmResult<()> {
        let conn = self.conn_mut()?;
        persist::delete_node(conn, T::LABEL, obj.uuid()).await
    }

    pub async fn delete_uuid(&mut self, uuid: &str) -> OgmResult<()> {
        let conn = self.conn_mut()?;
        persist::delete_by_uuids(conn, &[uuid]).await
    }

    // ── Raw queries ───────────────────────────────────────────────

    /// Run a hand-written query and decode its rows into `target`.
    pub async fn query<T: DeserializeOwned>(
        &mut self,
        cypher: &str,
        params: &Params,
        target: &mut Vec<T>,
    ) -> OgmResult<()> {
        let result = self.run(&Cypher::new(cypher), params).await?;
        *target = decode::decode_rows(&result)?;
        Ok(())
    }

    /// Run a hand-written query. Rows come back untouched, each value in
    /// the position of its column in `columns`.
    pub async fn query_raw(&mut self, cypher: &str, params: &Params) -> OgmResult<QueryResult> {
        self.run(&Cypher::new(cypher), params).await
    }

    /// Delete every node and relationship in the database.
    #[cfg(feature = "purge")]
    pub async fn purge_database(&mut self) -> OgmResult<()> {
        warn!("Purging every node in the database");
        self.run(&Cypher::new("MATCH (n) DETACH DELETE n"), &Params::new())
            .await?;
        Ok(())
    }

    pub(crate) async fn run(&mut self, query: &Cypher, params: &Params) -> OgmResult<QueryResult> {
        let conn = self.conn_mut()?;
        debug!(cypher = query.as_str(), params = params.len(), "Running statement");
        conn.query_raw(query.as_str(), params).await
    }
}

fn paginate(query: Cypher, pagination: Option<&Pagination>) -> OgmResult<Cypher> {
    match pagination {
        Some(pagination) => pagination.apply(query),
        None => Ok(query),
    }
}

//! Scripted in-memory connection used by unit tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use neogm_core::{OgmError, OgmResult, Params};

use crate::connection::{AccessMode, Connection, Driver, QueryResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Begin(AccessMode),
    Commit,
    Rollback,
    Query { cypher: String, params: Params },
    Close,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<Call>,
    responses: Vec<(String, QueryResult)>,
    fail_on: Vec<String>,
    fail_rollback: bool,
    fail_open: bool,
}

/// Shared handle: configure responses, then inspect recorded calls.
#[derive(Debug, Clone, Default)]
pub struct Mock {
    state: Arc<Mutex<MockState>>,
}

impl Mock {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue `result` for the next statement starting with `prefix`.
    pub fn respond(&self, prefix: &str, result: QueryResult) -> &Self {
        self.lock().responses.push((prefix.to_string(), result));
        self
    }

    /// Fail every statement containing `fragment`.
    pub fn fail_on(&self, fragment: &str) -> &Self {
        self.lock().fail_on.push(fragment.to_string());
        self
    }

    pub fn fail_rollback(&self) -> &Self {
        self.lock().fail_rollback = true;
        self
    }

    pub fn fail_open(&self) -> &Self {
        self.lock().fail_open = true;
        self
    }

    pub fn connection(&self) -> MockConnection {
        MockConnection { mock: self.clone() }
    }

    pub fn driver(&self) -> MockDriver {
        MockDriver { mock: self.clone() }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn queries(&self) -> Vec<(String, Params)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Query { cypher, params } => Some((cypher, params)),
                _ => None,
            })
            .collect()
    }

    pub fn statements(&self) -> Vec<String> {
        self.queries().into_iter().map(|(cypher, _)| cypher).collect()
    }
}

pub struct MockConnection {
    mock: Mock,
}

#[async_trait]
impl Connection for MockConnection {
    async fn begin(&mut self, mode: AccessMode) -> OgmResult<()> {
        self.mock.lock().calls.push(Call::Begin(mode));
        Ok(())
    }

    async fn commit(&mut self) -> OgmResult<()> {
        self.mock.lock().calls.push(Call::Commit);
        Ok(())
    }

    async fn rollback(&mut self) -> OgmResult<()> {
        let mut state = self.mock.lock();
        state.calls.push(Call::Rollback);
        if state.fail_rollback {
            return Err(OgmError::connection("rollback failed: connection reset"));
        }
        Ok(())
    }

    async fn query_raw(&mut self, cypher: &str, params: &Params) -> OgmResult<QueryResult> {
        let mut state = self.mock.lock();
        state.calls.push(Call::Query {
            cypher: cypher.to_string(),
            params: params.clone(),
        });

        if state.fail_on.iter().any(|fragment| cypher.contains(fragment.as_str())) {
            return Err(OgmError::query(cypher, "forced failure"));
        }

        let position = state
            .responses
            .iter()
            .position(|(prefix, _)| cypher.starts_with(prefix.as_str()));
        Ok(position
            .map(|idx| state.responses.remove(idx).1)
            .unwrap_or_default())
    }

    async fn close(&mut self) -> OgmResult<()> {
        self.mock.lock().calls.push(Call::Close);
        Ok(())
    }
}

pub struct MockDriver {
    mock: Mock,
}

#[async_trait]
impl Driver for MockDriver {
    type Conn = MockConnection;

    async fn open(&self, _mode: AccessMode) -> OgmResult<MockConnection> {
        if self.mock.lock().fail_open {
            return Err(OgmError::connection("no route to host"));
        }
        Ok(self.mock.connection())
    }
}

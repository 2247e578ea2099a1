//! Schema reconciliation: create, drop and verify the constraints and
//! indexes the type registry declares.
//!
//! Each operation runs as one transaction on its own connection. A failing
//! statement rolls the whole transaction back.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use neogm_core::{
    declared_schema, Cypher, OgmError, OgmResult, Params, SchemaCategory, SchemaDelta, SchemaItem, TypeRegistry,
};

use crate::connection::{AccessMode, Connection, Driver, QueryResult};
use crate::session::Session;

const SHOW_CONSTRAINTS: &str = "SHOW CONSTRAINTS YIELD name, type, labelsOrTypes, properties";

/// Token-lookup indexes belong to the database and constraint-backing indexes
/// are dropped with their constraint, so neither is listed.
const SHOW_INDEXES: &str = "SHOW INDEXES YIELD name, type, labelsOrTypes, properties, owningConstraint \
     WHERE type <> 'LOOKUP' AND owningConstraint IS NULL";

pub struct SchemaReconciler<'a, D: Driver> {
    driver: &'a D,
    registry: Arc<TypeRegistry>,
}

impl<'a, D: Driver> SchemaReconciler<'a, D> {
    pub fn new(driver: &'a D, registry: Arc<TypeRegistry>) -> Self {
        Self { driver, registry }
    }

    /// Create a unique constraint for every primary-key or unique field and
    /// one composite index per type over its indexed fields. Returns the
    /// number of objects created.
    pub async fn create_all(&self) -> OgmResult<usize> {
        self.require_types()?;
        let mut session = self.open(AccessMode::Write).await?;
        let outcome = create_declared(&mut session, &self.registry).await;
        let created = finish(session, outcome).await?;
        info!(created, "Created indexes and constraints");
        Ok(created)
    }

    /// Drop every constraint, then every remaining index. Returns the number
    /// of objects dropped.
    pub async fn drop_all(&self) -> OgmResult<usize> {
        let mut session = self.open(AccessMode::Write).await?;
        let outcome = drop_existing(&mut session).await;
        let dropped = finish(session, outcome).await?;
        info!(dropped, "Dropped indexes and constraints");
        Ok(dropped)
    }

    /// Compare the declared schema with the database. Never writes.
    pub async fn verify_all(&self) -> OgmResult<()> {
        self.require_types()?;

        let mut expected_constraints = BTreeSet::new();
        let mut expected_indexes = BTreeSet::new();
        for plan in declared_schema(&self.registry) {
            expected_constraints.extend(plan.constraints);
            expected_indexes.extend(plan.index);
        }

        let mut session = self.open(AccessMode::Read).await?;
        let outcome = observe(&mut session).await;
        let (constraints, indexes) = finish(session, outcome).await?;

        let deltas: Vec<SchemaDelta> = [
            (SchemaCategory::Constraints, &expected_constraints, &constraints),
            (SchemaCategory::Indexes, &expected_indexes, &indexes),
        ]
        .into_iter()
        .filter_map(|(category, expected, observed)| SchemaDelta::between(category, expected, observed))
        .collect();

        if !deltas.is_empty() {
            for delta in &deltas {
                warn!(
                    category = %delta.category,
                    missing = delta.missing.len(),
                    unexpected = delta.unexpected.len(),
                    "Schema drift detected"
                );
            }
            return Err(OgmError::SchemaDrift(deltas));
        }

        info!(
            constraints = constraints.len(),
            indexes = indexes.len(),
            "Schema matches declared types"
        );
        Ok(())
    }

    fn require_types(&self) -> OgmResult<()> {
        if self.registry.is_empty() {
            return Err(OgmError::validation("type registry must not be empty"));
        }
        Ok(())
    }

    async fn open(&self, mode: AccessMode) -> OgmResult<Session<D::Conn>> {
        let conn = self.driver.open(mode).await.map_err(into_connection_error)?;
        let mut session = Session::new(conn, Arc::clone(&self.registry));
        session
            .begin(mode == AccessMode::Read)
            .await
            .map_err(into_connection_error)?;
        Ok(session)
    }
}

fn into_connection_error(err: OgmError) -> OgmError {
    match err {
        OgmError::Connection(_) => err,
        other => OgmError::connection(format!("failed to open schema transaction: {}", other)),
    }
}

async fn finish<C: Connection, T>(mut session: Session<C>, outcome: OgmResult<T>) -> OgmResult<T> {
    let result = session.finish_transaction(outcome).await;
    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close schema session");
    }
    result
}

async fn create_declared<C: Connection>(session: &mut Session<C>, registry: &TypeRegistry) -> OgmResult<usize> {
    let mut created = 0;
    for plan in declared_schema(registry) {
        let var = plan.type_name.to_lowercase();
        for item in plan.constraints.iter().chain(plan.index.iter()) {
            let statement = item.create_statement(&var)?;
            session.run(&statement, &Params::new()).await?;
            debug!(item = %item, "Created schema object");
            created += 1;
        }
    }
    Ok(created)
}

async fn drop_existing<C: Connection>(session: &mut Session<C>) -> OgmResult<usize> {
    let mut dropped = 0;

    let constraints = session.run(&Cypher::new(SHOW_CONSTRAINTS), &Params::new()).await?;
    for row in &constraints.rows {
        let statement = match (text(&constraints, row, "name"), text(&constraints, row, "description")) {
            (Some(name), _) => format!("DROP CONSTRAINT {}", quote(name)),
            (None, Some(description)) => format!("DROP {}", description),
            (None, None) => return Err(OgmError::validation("invalid constraint config")),
        };
        session.run(&Cypher::new(statement.as_str()), &Params::new()).await?;
        debug!(statement = %statement, "Dropped constraint");
        dropped += 1;
    }

    let indexes = session.run(&Cypher::new(SHOW_INDEXES), &Params::new()).await?;
    if indexes.is_empty() {
        return Ok(dropped);
    }

    for row in &indexes.rows {
        let statement = match (text(&indexes, row, "name"), text(&indexes, row, "description")) {
            (Some(name), _) => format!("DROP INDEX {}", quote(name)),
            (None, Some(description)) => match SchemaItem::parse_descriptor(description) {
                item @ SchemaItem::Index { .. } => format!("DROP {}", item),
                _ => return Err(OgmError::validation("invalid index config")),
            },
            (None, None) => return Err(OgmError::validation("invalid index config")),
        };
        session.run(&Cypher::new(statement.as_str()), &Params::new()).await?;
        debug!(statement = %statement, "Dropped index");
        dropped += 1;
    }

    Ok(dropped)
}

async fn observe<C: Connection>(session: &mut Session<C>) -> OgmResult<(BTreeSet<SchemaItem>, BTreeSet<SchemaItem>)> {
    let constraints = session.run(&Cypher::new(SHOW_CONSTRAINTS), &Params::new()).await?;
    let constraints = constraints
        .rows
        .iter()
        .map(|row| {
            observed_item(&constraints, row, |labels, properties| {
                let kind = text(&constraints, row, "type").unwrap_or_default();
                SchemaItem::observed_constraint(kind, labels, properties)
            })
        })
        .collect::<OgmResult<BTreeSet<_>>>()?;

    let indexes = session.run(&Cypher::new(SHOW_INDEXES), &Params::new()).await?;
    let indexes = indexes
        .rows
        .iter()
        .map(|row| observed_item(&indexes, row, SchemaItem::observed_index))
        .collect::<OgmResult<BTreeSet<_>>>()?;

    Ok((constraints, indexes))
}

/// Structured columns win; a row carrying only a description is parsed.
fn observed_item(
    result: &QueryResult,
    row: &[Value],
    structured: impl FnOnce(&[String], &[String]) -> SchemaItem,
) -> OgmResult<SchemaItem> {
    if let Some(labels) = strings(result, row, "labelsOrTypes") {
        let properties = strings(result, row, "properties").unwrap_or_default();
        return Ok(structured(&labels, &properties));
    }
    match text(result, row, "description") {
        Some(description) => Ok(SchemaItem::parse_descriptor(description)),
        None => Err(OgmError::query(
            "schema",
            "row carries neither labelsOrTypes nor a description",
        )),
    }
}

fn text<'r>(result: &QueryResult, row: &'r [Value], column: &str) -> Option<&'r str> {
    result
        .value(row, column)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn strings(result: &QueryResult, row: &[Value], column: &str) -> Option<Vec<String>> {
    match result.value(row, column)? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}

fn quote(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

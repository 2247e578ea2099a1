//! Save and delete routines.
//!
//! A save walks the object graph breadth-first from the root, up to `depth`
//! hops, upserting every node it reaches by uuid and merging every edge it
//! walks. Nodes are written before edges so both endpoints exist when an
//! edge is merged.

use std::collections::{HashSet, VecDeque};

use serde_json::Value;
use tracing::debug;

use neogm_core::{validate_identifier, Direction, GraphNode, OgmError, OgmResult, Params};

use crate::connection::Connection;

/// Counts of what a save wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub nodes: usize,
    pub relationships: usize,
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct EdgePlan {
    start_label: String,
    start: String,
    rel_type: &'static str,
    end_label: String,
    end: String,
}

/// Upsert `root` and everything reachable from it within `depth` hops.
pub async fn save_depth<C: Connection + ?Sized>(
    conn: &mut C,
    root: &dyn GraphNode,
    depth: i32,
) -> OgmResult<SaveSummary> {
    if depth < 0 {
        return Err(OgmError::validation(format!("depth must not be negative, got {}", depth)));
    }

    let (nodes, edges) = plan(root, depth)?;

    for node in &nodes {
        let mut params = Params::new();
        params.insert("uuid".to_string(), Value::from(node.node_uuid()));
        params.insert(
            "props".to_string(),
            Value::Object(node.properties()?.into_iter().collect()),
        );
        let cypher = format!("MERGE (n:{} {{uuid: $uuid}}) SET n += $props", node.label());
        conn.query_raw(&cypher, &params).await?;
        debug!(label = node.label(), uuid = node.node_uuid(), "Saved node");
    }

    for edge in &edges {
        let mut params = Params::new();
        params.insert("start".to_string(), Value::from(edge.start.as_str()));
        params.insert("end".to_string(), Value::from(edge.end.as_str()));
        let cypher = format!(
            "MATCH (a:{} {{uuid: $start}}), (b:{} {{uuid: $end}}) MERGE (a)-[:{}]->(b)",
            edge.start_label, edge.end_label, edge.rel_type
        );
        conn.query_raw(&cypher, &params).await?;
    }

    Ok(SaveSummary {
        nodes: nodes.len(),
        relationships: edges.len(),
    })
}

#[allow(clippy::type_complexity)]
fn plan(root: &dyn GraphNode, depth: i32) -> OgmResult<(Vec<&dyn GraphNode>, Vec<EdgePlan>)> {
    let mut nodes: Vec<&dyn GraphNode> = Vec::new();
    let mut edges = Vec::new();
    let mut seen_nodes = HashSet::new();
    let mut seen_edges = HashSet::new();
    let mut queue = VecDeque::from([(root, 0)]);

    while let Some((node, level)) = queue.pop_front() {
        check_node(node)?;
        if !seen_nodes.insert(node.node_uuid().to_string()) {
            continue;
        }
        nodes.push(node);

        if level >= depth {
            continue;
        }

        for relation in node.related() {
            validate_identifier("relationship type", relation.rel_type)?;
            let other = relation.node;
            check_node(other)?;

            let (start, end) = match relation.direction {
                Direction::Outgoing => (node, other),
                Direction::Incoming => (other, node),
                Direction::Both => {
                    return Err(OgmError::invalid_argument(format!(
                        "relationship '{}' needs a direction to be saved",
                        relation.rel_type
                    )))
                }
            };
            let edge = EdgePlan {
                start_label: start.label().to_string(),
                start: start.node_uuid().to_string(),
                rel_type: relation.rel_type,
                end_label: end.label().to_string(),
                end: end.node_uuid().to_string(),
            };
            if seen_edges.insert((edge.start.clone(), edge.rel_type, edge.end.clone())) {
                edges.push(edge);
            }
            queue.push_back((other, level + 1));
        }
    }

    Ok((nodes, edges))
}

fn check_node(node: &dyn GraphNode) -> OgmResult<()> {
    if node.node_uuid().is_empty() {
        return Err(OgmError::invalid_argument(format!(
            "cannot save a {} node without a uuid",
            node.label()
        )));
    }
    validate_identifier("label", node.label())
}

/// Detach and delete the node with `label` and `uuid`.
pub async fn delete_node<C: Connection + ?Sized>(conn: &mut C, label: &str, uuid: &str) -> OgmResult<()> {
    if uuid.is_empty() {
        return Err(OgmError::invalid_argument("delete object has no uuid"));
    }
    validate_identifier("label", label)?;

    let mut params = Params::new();
    params.insert("uuid".to_string(), Value::from(uuid));
    conn.query_raw(
        &format!("MATCH (n:{} {{uuid: $uuid}}) DETACH DELETE n", label),
        &params,
    )
    .await?;
    Ok(())
}

/// Detach and delete every node whose uuid is in `uuids`.
pub async fn delete_by_uuids<C: Connection + ?Sized>(conn: &mut C, uuids: &[&str]) -> OgmResult<()> {
    if uuids.is_empty() || uuids.iter().any(|u| u.is_empty()) {
        return Err(OgmError::invalid_argument("uuid must not be empty"));
    }

    let mut params = Params::new();
    params.insert(
        "uuids".to_string(),
        Value::Array(uuids.iter().map(|u| Value::from(*u)).collect()),
    );
    conn.query_raw("MATCH (n) WHERE n.uuid IN $uuids DETACH DELETE n", &params)
        .await?;
    Ok(())
}

//! Nodes and edges returned alongside a loaded entity.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{OgmError, OgmResult};
use crate::registry::NodeEntity;

/// Direction of a relationship relative to the node it is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A node reached while traversing from a loaded root.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedNode {
    pub uuid: String,
    pub labels: Vec<String>,
    pub properties: Map<String, Value>,
}

impl LoadedNode {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> OgmResult<T> {
        let value = Value::Object(self.properties.clone());
        serde_json::from_value(value.clone()).map_err(|e| OgmError::decode(&value, e))
    }
}

/// A directed, typed relationship between two loaded nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadedEdge {
    pub rel_type: String,
    pub start: String,
    pub end: String,
}

/// Every node and edge seen on the paths returned for one load.
#[derive(Debug, Clone, Default)]
pub struct Neighborhood {
    nodes: HashMap<String, LoadedNode>,
    edges: Vec<LoadedEdge>,
}

impl Neighborhood {
    pub fn insert_node(&mut self, node: LoadedNode) {
        self.nodes.entry(node.uuid.clone()).or_insert(node);
    }

    pub fn insert_edge(&mut self, edge: LoadedEdge) {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub fn node(&self, uuid: &str) -> Option<&LoadedNode> {
        self.nodes.get(uuid)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[LoadedEdge] {
        &self.edges
    }

    /// Nodes linked to `uuid` by a `rel_type` edge in the given direction.
    pub fn related(&self, uuid: &str, rel_type: &str, direction: Direction) -> Vec<&LoadedNode> {
        self.edges
            .iter()
            .filter(|edge| edge.rel_type == rel_type)
            .filter_map(|edge| {
                let other = match direction {
                    Direction::Outgoing if edge.start == uuid => &edge.end,
                    Direction::Incoming if edge.end == uuid => &edge.start,
                    Direction::Both if edge.start == uuid => &edge.end,
                    Direction::Both if edge.end == uuid => &edge.start,
                    _ => return None,
                };
                self.nodes.get(other)
            })
            .collect()
    }

    /// Decode the related nodes carrying `T`'s label.
    pub fn decode_related<T: NodeEntity>(
        &self,
        uuid: &str,
        rel_type: &str,
        direction: Direction,
    ) -> OgmResult<Vec<T>> {
        self.related(uuid, rel_type, direction)
            .into_iter()
            .filter(|node| node.has_label(T::LABEL))
            .map(|node| node.decode::<T>())
            .collect()
    }
}

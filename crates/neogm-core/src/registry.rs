//! Type metadata registry.
//!
//! Every persistable type registers its label and field metadata once at
//! startup. The resulting [`TypeRegistry`] is immutable and is shared by
//! reference between sessions and the schema reconciler.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::cypher::{validate_identifier, Params};
use crate::error::{OgmError, OgmResult};
use crate::neighborhood::{Direction, Neighborhood};

/// Per-field metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFieldConfig {
    pub name: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub index: bool,
}

impl TypeFieldConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: false,
            unique: false,
            index: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    /// Primary keys are a special unique key; both get a single-field
    /// unique constraint and never join a composite index.
    pub fn requires_constraint(&self) -> bool {
        self.primary_key || self.unique
    }
}

/// Label and field metadata of one mapped entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSchemaConfig {
    #[serde(alias = "name")]
    pub type_name: String,
    pub label: String,
    #[serde(default)]
    pub fields: Vec<TypeFieldConfig>,
}

impl TypeSchemaConfig {
    pub fn new(
        type_name: impl Into<String>,
        label: impl Into<String>,
        fields: Vec<TypeFieldConfig>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            label: label.into(),
            fields,
        }
    }

    /// Fields folded into this type's composite index, in declaration order.
    pub fn index_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| !f.requires_constraint() && f.index)
            .map(|f| f.name.as_str())
            .collect()
    }

    fn validate(&self) -> OgmResult<()> {
        validate_identifier("type name", &self.type_name).map_err(to_validation)?;
        validate_identifier("label", &self.label).map_err(to_validation)?;
        for field in &self.fields {
            validate_identifier("field", &field.name).map_err(to_validation)?;
        }
        Ok(())
    }
}

fn to_validation(err: OgmError) -> OgmError {
    match err {
        OgmError::Query { message, .. } => OgmError::validation(message),
        other => other,
    }
}

/// A related node reachable from an entity, used by the save routine.
pub struct Relation<'a> {
    pub rel_type: &'static str,
    pub direction: Direction,
    pub node: &'a dyn GraphNode,
}

impl<'a> Relation<'a> {
    pub fn outgoing(rel_type: &'static str, node: &'a dyn GraphNode) -> Self {
        Self {
            rel_type,
            direction: Direction::Outgoing,
            node,
        }
    }

    pub fn incoming(rel_type: &'static str, node: &'a dyn GraphNode) -> Self {
        Self {
            rel_type,
            direction: Direction::Incoming,
            node,
        }
    }
}

/// A type that maps to a graph node.
///
/// Implementors declare their label and field metadata up front so that
/// sessions never need to inspect values at runtime to find out what they
/// are loading or saving.
pub trait NodeEntity: Serialize + DeserializeOwned + Send + Sync {
    /// Registry key of the type.
    const TYPE_NAME: &'static str;
    /// Node label the type is stored under.
    const LABEL: &'static str;

    /// Identifier stored in the node's `uuid` property.
    fn uuid(&self) -> &str;

    fn fields() -> Vec<TypeFieldConfig> {
        Vec::new()
    }

    /// Nodes directly related to this one.
    fn relations(&self) -> Vec<Relation<'_>> {
        Vec::new()
    }

    /// Attach related nodes after a load. The default ignores them.
    fn hydrate(&mut self, _neighborhood: &Neighborhood) -> OgmResult<()> {
        Ok(())
    }

    fn schema() -> TypeSchemaConfig {
        TypeSchemaConfig::new(Self::TYPE_NAME, Self::LABEL, Self::fields())
    }
}

/// Object-safe view of a [`NodeEntity`], used to walk heterogeneous graphs.
pub trait GraphNode: Send + Sync {
    fn label(&self) -> &str;
    fn node_uuid(&self) -> &str;
    fn properties(&self) -> OgmResult<Params>;
    fn related(&self) -> Vec<Relation<'_>>;
}

impl<T: NodeEntity> GraphNode for T {
    fn label(&self) -> &str {
        T::LABEL
    }

    fn node_uuid(&self) -> &str {
        NodeEntity::uuid(self)
    }

    fn properties(&self) -> OgmResult<Params> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map
                .into_iter()
                .filter(|(_, value)| is_storable(value))
                .collect()),
            other => Err(OgmError::decode(&other, "node must serialize to a map")),
        }
    }

    fn related(&self) -> Vec<Relation<'_>> {
        self.relations()
    }
}

/// Nodes only hold primitives and flat lists of primitives.
fn is_storable(value: &Value) -> bool {
    match value {
        Value::Object(_) => false,
        Value::Array(items) => items
            .iter()
            .all(|v| !matches!(v, Value::Object(_) | Value::Array(_))),
        _ => true,
    }
}

/// Immutable mapping from type name to its schema config.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeSchemaConfig>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Build a registry from declarative configs, e.g. loaded from a file.
    pub fn from_configs(configs: impl IntoIterator<Item = TypeSchemaConfig>) -> OgmResult<Self> {
        configs
            .into_iter()
            .fold(Self::builder(), TypeRegistryBuilder::add)
            .build()
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeSchemaConfig> {
        self.types.get(type_name)
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.types.values().any(|config| config.label == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeSchemaConfig)> {
        self.types.iter().map(|(name, config)| (name.as_str(), config))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Collects type configs before freezing them into a [`TypeRegistry`].
#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    configs: Vec<TypeSchemaConfig>,
}

impl TypeRegistryBuilder {
    pub fn register<T: NodeEntity>(self) -> Self {
        self.add(T::schema())
    }

    pub fn add(mut self, config: TypeSchemaConfig) -> Self {
        self.configs.push(config);
        self
    }

    pub fn build(self) -> OgmResult<TypeRegistry> {
        let mut types = BTreeMap::new();
        for config in self.configs {
            config.validate()?;
            if types.contains_key(&config.type_name) {
                return Err(OgmError::validation(format!(
                    "type '{}' registered twice",
                    config.type_name
                )));
            }
            types.insert(config.type_name.clone(), config);
        }
        debug!(types = types.len(), "Type registry built");
        Ok(TypeRegistry { types })
    }
}

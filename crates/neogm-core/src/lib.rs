//! # NeoGM Core
//!
//! I/O-free building blocks of the NeoGM object-graph mapper: the error
//! taxonomy, the type registry, pagination, Cypher query building and the
//! structured schema model used for reconciliation.

pub mod cypher;
pub mod error;
pub mod neighborhood;
pub mod pagination;
pub mod registry;
pub mod schema;

pub use cypher::{validate_identifier, Condition, ConstraintSpec, Cypher, IndexSpec, OrderBy, Params};
pub use error::{OgmError, OgmResult};
pub use neighborhood::{Direction, LoadedEdge, LoadedNode, Neighborhood};
pub use pagination::Pagination;
pub use registry::{
    GraphNode, NodeEntity, Relation, TypeFieldConfig, TypeRegistry, TypeRegistryBuilder,
    TypeSchemaConfig,
};
pub use schema::{declared_schema, SchemaCategory, SchemaDelta, SchemaItem, TypeSchemaPlan};

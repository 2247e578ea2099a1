//! Structured model of declared and observed constraints and indexes.

use std::collections::BTreeSet;
use std::fmt;

use crate::cypher::{ConstraintSpec, Cypher, IndexSpec};
use crate::error::{OgmError, OgmResult};
use crate::registry::TypeRegistry;

/// A constraint or index, as declared by the registry or found in the database.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaItem {
    UniqueConstraint { label: String, field: String },
    Index { label: String, fields: Vec<String> },
    /// Anything the database reports that has no structured counterpart.
    Opaque(String),
}

impl SchemaItem {
    pub fn unique(label: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UniqueConstraint {
            label: label.into(),
            field: field.into(),
        }
    }

    pub fn index<S: Into<String>>(label: impl Into<String>, fields: impl IntoIterator<Item = S>) -> Self {
        Self::Index {
            label: label.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Creation statement for a declared item. `var` names the node variable.
    pub fn create_statement(&self, var: &str) -> OgmResult<Cypher> {
        match self {
            Self::UniqueConstraint { label, field } => ConstraintSpec {
                unique: true,
                name: var.to_string(),
                label: label.clone(),
                field: field.clone(),
            }
            .to_cypher(),
            Self::Index { label, fields } => IndexSpec {
                label: label.clone(),
                fields: fields.clone(),
            }
            .to_cypher(),
            Self::Opaque(text) => Err(OgmError::unsupported(format!(
                "cannot create opaque schema item '{}'",
                text
            ))),
        }
    }

    /// Build an item from a `SHOW CONSTRAINTS` row.
    pub fn observed_constraint(constraint_type: &str, labels: &[String], properties: &[String]) -> Self {
        match (labels, properties) {
            ([label], [field]) if constraint_type.to_ascii_uppercase().contains("UNIQUE") => {
                Self::unique(label.clone(), field.clone())
            }
            _ => Self::Opaque(format!(
                "CONSTRAINT {} ON :{}({})",
                constraint_type,
                labels.join(":"),
                properties.join(", ")
            )),
        }
    }

    /// Build an item from a `SHOW INDEXES` row.
    pub fn observed_index(labels: &[String], properties: &[String]) -> Self {
        match labels {
            [label] if !properties.is_empty() => Self::index(label.clone(), properties.iter().cloned()),
            _ => Self::Opaque(format!(
                "INDEX ON :{}({})",
                labels.join(":"),
                properties.join(", ")
            )),
        }
    }

    /// Parse a legacy description string such as
    /// `CONSTRAINT ON ( person:Person ) ASSERT person.id IS UNIQUE` or
    /// `INDEX ON :Person(age, city)`. Unrecognised text stays opaque.
    pub fn parse_descriptor(text: &str) -> Self {
        let text = text.trim();
        parse_constraint(text)
            .or_else(|| parse_index(text))
            .unwrap_or_else(|| Self::Opaque(text.to_string()))
    }
}

fn parse_constraint(text: &str) -> Option<SchemaItem> {
    let rest = text.strip_prefix("CONSTRAINT ON")?.trim_start();
    let rest = rest.strip_prefix('(')?;
    let (pattern, rest) = rest.split_once(')')?;
    let (var, label) = pattern.trim().split_once(':')?;
    let assertion = rest.trim().strip_prefix("ASSERT")?.trim();
    let property = assertion.strip_suffix("IS UNIQUE")?.trim();
    let property = property.trim_start_matches('(').trim_end_matches(')').trim();
    let field = property.strip_prefix(var.trim())?.strip_prefix('.')?;
    Some(SchemaItem::unique(label.trim(), field.trim()))
}

fn parse_index(text: &str) -> Option<SchemaItem> {
    let rest = text.strip_prefix("INDEX ON")?.trim_start().strip_prefix(':')?;
    let (label, rest) = rest.split_once('(')?;
    let fields = rest.trim_end().strip_suffix(')')?;
    let fields: Vec<&str> = fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    if fields.is_empty() {
        return None;
    }
    Some(SchemaItem::index(label.trim(), fields))
}

impl fmt::Display for SchemaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UniqueConstraint { label, field } => {
                write!(f, "CONSTRAINT ON (n:{}) ASSERT n.{} IS UNIQUE", label, field)
            }
            Self::Index { label, fields } => write!(f, "INDEX ON :{}({})", label, fields.join(", ")),
            Self::Opaque(text) => f.write_str(text),
        }
    }
}

/// Which half of the schema a delta concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaCategory {
    Constraints,
    Indexes,
}

impl fmt::Display for SchemaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constraints => f.write_str("constraints"),
            Self::Indexes => f.write_str("indexes"),
        }
    }
}

/// Difference between declared and observed items of one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDelta {
    pub category: SchemaCategory,
    /// Declared but absent from the database.
    pub missing: Vec<SchemaItem>,
    /// Present in the database but not declared.
    pub unexpected: Vec<SchemaItem>,
}

impl SchemaDelta {
    /// Symmetric difference of `declared` and `observed`, `None` when equal.
    pub fn between(
        category: SchemaCategory,
        declared: &BTreeSet<SchemaItem>,
        observed: &BTreeSet<SchemaItem>,
    ) -> Option<Self> {
        let missing: Vec<SchemaItem> = declared.difference(observed).cloned().collect();
        let unexpected: Vec<SchemaItem> = observed.difference(declared).cloned().collect();

        if missing.is_empty() && unexpected.is_empty() {
            None
        } else {
            Some(Self {
                category,
                missing,
                unexpected,
            })
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &SchemaItem> {
        self.missing.iter().chain(self.unexpected.iter())
    }
}

impl fmt::Display for SchemaDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |items: &[SchemaItem]| {
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        };
        write!(
            f,
            "found differences in remote vs declared {}: missing [{}], unexpected [{}]",
            self.category,
            render(&self.missing),
            render(&self.unexpected)
        )
    }
}

/// One type's declared items, in creation order: a unique constraint per
/// primary/unique field, then one composite index over the indexed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSchemaPlan {
    pub type_name: String,
    pub constraints: Vec<SchemaItem>,
    pub index: Option<SchemaItem>,
}

/// Derive the schema every registered type requires. Types without fields
/// are skipped.
pub fn declared_schema(registry: &TypeRegistry) -> Vec<TypeSchemaPlan> {
    registry
        .iter()
        .filter(|(_, config)| !config.fields.is_empty())
        .map(|(type_name, config)| {
            let constraints = config
                .fields
                .iter()
                .filter(|field| field.requires_constraint())
                .map(|field| SchemaItem::unique(config.label.clone(), field.name.clone()))
                .collect();

            let index_fields = config.index_fields();
            let index = (!index_fields.is_empty())
                .then(|| SchemaItem::index(config.label.clone(), index_fields));

            TypeSchemaPlan {
                type_name: type_name.to_string(),
                constraints,
                index,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{TypeFieldConfig, TypeSchemaConfig};

    fn person_registry() -> TypeRegistry {
        TypeRegistry::from_configs([
            TypeSchemaConfig::new(
                "Person",
                "Person",
                vec![
                    TypeFieldConfig::new("id").unique(),
                    TypeFieldConfig::new("age").indexed(),
                    TypeFieldConfig::new("city").indexed(),
                ],
            ),
            TypeSchemaConfig::new("Tag", "Tag", vec![]),
        ])
        .unwrap()
    }

    #[test]
    fn test_declared_schema() {
        let plans = declared_schema(&person_registry());
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].constraints, vec![SchemaItem::unique("Person", "id")]);
        assert_eq!(plans[0].index, Some(SchemaItem::index("Person", ["age", "city"])));
    }

    #[test]
    fn test_descriptor_rendering() {
        assert_eq!(
            SchemaItem::unique("Person", "id").to_string(),
            "CONSTRAINT ON (n:Person) ASSERT n.id IS UNIQUE"
        );
        assert_eq!(
            SchemaItem::index("Person", ["age", "city"]).to_string(),
            "INDEX ON :Person(age, city)"
        );
    }

    #[test]
    fn test_parse_legacy_descriptors() {
        assert_eq!(
            SchemaItem::parse_descriptor("CONSTRAINT ON ( person:Person ) ASSERT person.id IS UNIQUE"),
            SchemaItem::unique("Person", "id")
        );
        assert_eq!(
            SchemaItem::parse_descriptor("CONSTRAINT ON ( p:Person ) ASSERT (p.id) IS UNIQUE"),
            SchemaItem::unique("Person", "id")
        );
        assert_eq!(
            SchemaItem::parse_descriptor("INDEX ON :Person(age,city)"),
            SchemaItem::index("Person", ["age", "city"])
        );
        assert_eq!(
            SchemaItem::parse_descriptor("INDEX ON :Person()"),
            SchemaItem::Opaque("INDEX ON :Person()".to_string())
        );
    }

    #[test]
    fn test_composite_fields_stay_distinct() {
        assert_ne!(
            SchemaItem::index("T", ["ab", "c"]),
            SchemaItem::index("T", ["a", "bc"])
        );
    }

    #[test]
    fn test_observed_items() {
        let labels = vec!["Person".to_string()];
        assert_eq!(
            SchemaItem::observed_constraint("UNIQUENESS", &labels, &["id".to_string()]),
            SchemaItem::unique("Person", "id")
        );
        assert!(matches!(
            SchemaItem::observed_constraint("NODE_PROPERTY_EXISTENCE", &labels, &["id".to_string()]),
            SchemaItem::Opaque(_)
        ));
        assert_eq!(
            SchemaItem::observed_index(&labels, &["age".to_string(), "city".to_string()]),
            SchemaItem::index("Person", ["age", "city"])
        );
    }

    #[test]
    fn test_delta_between() {
        let declared: BTreeSet<_> = [SchemaItem::unique("Person", "id"), SchemaItem::unique("Person", "email")]
            .into_iter()
            .collect();
        let observed: BTreeSet<_> = [SchemaItem::unique("Person", "id"), SchemaItem::unique("Tag", "name")]
            .into_iter()
            .collect();

        let delta = SchemaDelta::between(SchemaCategory::Constraints, &declared, &observed).unwrap();
        assert_eq!(delta.missing, vec![SchemaItem::unique("Person", "email")]);
        assert_eq!(delta.unexpected, vec![SchemaItem::unique("Tag", "name")]);
        assert!(SchemaDelta::between(SchemaCategory::Indexes, &declared, &declared).is_none());
    }
}

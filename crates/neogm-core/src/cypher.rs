//! Cypher query building.
//!
//! Statements are assembled from declarative specs. Labels, variables and
//! property names are spliced into query text, so every identifier is
//! validated before it gets there; values always travel as parameters.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::error::{OgmError, OgmResult};

/// Query parameters keyed by name.
pub type Params = BTreeMap<String, Value>;

/// Reject anything that is not a plain `[A-Za-z_][A-Za-z0-9_]*` identifier.
pub fn validate_identifier(kind: &str, name: &str) -> OgmResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(OgmError::query(
            "build",
            format!("invalid {} identifier '{}'", kind, name),
        ))
    }
}

/// An executable Cypher statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cypher {
    text: String,
}

impl Cypher {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn order_by(mut self, order: &OrderBy) -> OgmResult<Self> {
        validate_identifier("order variable", &order.name)?;
        validate_identifier("order member", &order.member)?;
        self.text.push_str(&format!(" ORDER BY {}.{}", order.name, order.member));
        if order.desc {
            self.text.push_str(" DESC");
        }
        Ok(self)
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.text.push_str(&format!(" SKIP {}", skip));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.text.push_str(&format!(" LIMIT {}", limit));
        self
    }
}

impl fmt::Display for Cypher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Ordering of a result set by `name.member`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub name: String,
    pub member: String,
    pub desc: bool,
}

/// A single-field constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSpec {
    pub unique: bool,
    /// Variable bound to the node in the statement.
    pub name: String,
    pub label: String,
    pub field: String,
}

impl ConstraintSpec {
    pub fn to_cypher(&self) -> OgmResult<Cypher> {
        if !self.unique {
            return Err(OgmError::unsupported("only unique constraints can be created"));
        }
        validate_identifier("variable", &self.name)?;
        validate_identifier("label", &self.label)?;
        validate_identifier("field", &self.field)?;

        Ok(Cypher::new(format!(
            "CREATE CONSTRAINT FOR ({var}:{label}) REQUIRE {var}.{field} IS UNIQUE",
            var = self.name,
            label = self.label,
            field = self.field,
        )))
    }
}

/// A single or composite property index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub label: String,
    pub fields: Vec<String>,
}

impl IndexSpec {
    pub fn to_cypher(&self) -> OgmResult<Cypher> {
        validate_identifier("label", &self.label)?;
        if self.fields.is_empty() {
            return Err(OgmError::query("build", "index needs at least one field"));
        }
        for field in &self.fields {
            validate_identifier("field", field)?;
        }

        let properties = self
            .fields
            .iter()
            .map(|field| format!("n.{}", field))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(Cypher::new(format!(
            "CREATE INDEX FOR (n:{}) ON ({})",
            self.label, properties
        )))
    }
}

/// A `WHERE` predicate over query variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    text: String,
}

impl Condition {
    /// Wrap a hand-written predicate. Values must be referenced as `$params`.
    pub fn raw(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// `var.field = $param`
    pub fn eq(var: &str, field: &str, param: &str) -> OgmResult<Self> {
        validate_identifier("variable", var)?;
        validate_identifier("field", field)?;
        validate_identifier("parameter", param)?;
        Ok(Self::raw(format!("{}.{} = ${}", var, field, param)))
    }

    pub fn and(self, other: Condition) -> Self {
        Self::raw(format!("({}) AND ({})", self.text, other.text))
    }

    pub fn or(self, other: Condition) -> Self {
        Self::raw(format!("({}) OR ({})", self.text, other.text))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("label", "Person").is_ok());
        assert!(validate_identifier("label", "_private2").is_ok());
        assert!(validate_identifier("label", "").is_err());
        assert!(validate_identifier("label", "2fast").is_err());
        assert!(validate_identifier("label", "Person) DETACH DELETE (x").is_err());
    }

    #[test]
    fn test_unique_constraint() {
        let spec = ConstraintSpec {
            unique: true,
            name: "person".to_string(),
            label: "Person".to_string(),
            field: "id".to_string(),
        };
        assert_eq!(
            spec.to_cypher().unwrap().as_str(),
            "CREATE CONSTRAINT FOR (person:Person) REQUIRE person.id IS UNIQUE"
        );
    }

    #[test]
    fn test_non_unique_constraint_unsupported() {
        let spec = ConstraintSpec {
            unique: false,
            name: "n".to_string(),
            label: "Person".to_string(),
            field: "id".to_string(),
        };
        assert!(matches!(spec.to_cypher(), Err(OgmError::Unsupported(_))));
    }

    #[test]
    fn test_composite_index() {
        let spec = IndexSpec {
            label: "Person".to_string(),
            fields: vec!["age".to_string(), "city".to_string()],
        };
        assert_eq!(
            spec.to_cypher().unwrap().as_str(),
            "CREATE INDEX FOR (n:Person) ON (n.age, n.city)"
        );
    }

    #[test]
    fn test_empty_index_is_build_error() {
        let spec = IndexSpec {
            label: "Person".to_string(),
            fields: vec![],
        };
        assert!(matches!(spec.to_cypher(), Err(OgmError::Query { .. })));
    }

    #[test]
    fn test_order_skip_limit() {
        let query = Cypher::new("MATCH (n) RETURN n")
            .order_by(&OrderBy {
                name: "n".to_string(),
                member: "name".to_string(),
                desc: true,
            })
            .unwrap()
            .skip(20)
            .limit(10);
        assert_eq!(
            query.as_str(),
            "MATCH (n) RETURN n ORDER BY n.name DESC SKIP 20 LIMIT 10"
        );
    }

    #[test]
    fn test_condition_composition() {
        let cond = Condition::eq("n", "name", "name")
            .unwrap()
            .and(Condition::raw("n.age > $min_age"));
        assert_eq!(cond.as_str(), "(n.name = $name) AND (n.age > $min_age)");
    }
}

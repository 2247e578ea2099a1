//! Load-strategy resolution: builds the traversal query for a load.
//!
//! Path loads match every path of up to `depth` hops out of the root and
//! return, per path, the root's properties plus the nodes and edges on the
//! path:
//!
//! ```cypher
//! MATCH p=(n:Person)-[*0..2]-()
//! WHERE n.uuid = $uuid
//! RETURN n {.*} AS n,
//!        [x IN nodes(p) | x {.*, _labels: labels(x)}] AS nodes,
//!        [r IN relationships(p) | {type: type(r), start: startNode(r).uuid, end: endNode(r).uuid}] AS edges
//! ```

use serde::Deserialize;

use neogm_core::{validate_identifier, Condition, Cypher, OgmError, OgmResult};

/// How related nodes are fetched during a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStrategy {
    #[default]
    Path,
    /// Reserved; not implemented.
    Schema,
}

/// Which roots a load starts from.
#[derive(Debug, Clone, Copy)]
pub enum LoadScope<'a> {
    /// The root whose uuid equals `$uuid`.
    One,
    /// Every node carrying the label.
    Many,
    /// Roots within `[min_jumps, max_jumps]` hops of an end node whose
    /// `end_node_field` equals the parameter of the same name.
    EdgeConstraint {
        end_node_type: &'a str,
        end_node_field: &'a str,
        min_jumps: i32,
        max_jumps: i32,
    },
}

/// Build the load query for `strategy`.
pub fn resolve(
    strategy: LoadStrategy,
    var: &str,
    label: &str,
    depth: i32,
    filter: Option<&Condition>,
    scope: LoadScope<'_>,
) -> OgmResult<Cypher> {
    match strategy {
        LoadStrategy::Path => match scope {
            LoadScope::One => path_load_one(var, label, depth, filter),
            LoadScope::Many => path_load_many(var, label, depth, filter),
            LoadScope::EdgeConstraint {
                end_node_type,
                end_node_field,
                min_jumps,
                max_jumps,
            } => path_load_edge_constraint(
                var,
                label,
                end_node_type,
                end_node_field,
                min_jumps,
                max_jumps,
                depth,
                filter,
            ),
        },
        LoadStrategy::Schema => Err(OgmError::unsupported("schema load strategy not supported yet")),
    }
}

pub fn path_load_one(var: &str, label: &str, depth: i32, filter: Option<&Condition>) -> OgmResult<Cypher> {
    check_shape(var, label, depth)?;
    let id_condition = Condition::eq(var, "uuid", "uuid")?;
    let condition = match filter {
        Some(filter) => id_condition.and(filter.clone()),
        None => id_condition,
    };
    Ok(build(&path_match(var, label, depth), Some(&condition), var))
}

pub fn path_load_many(var: &str, label: &str, depth: i32, filter: Option<&Condition>) -> OgmResult<Cypher> {
    check_shape(var, label, depth)?;
    Ok(build(&path_match(var, label, depth), filter, var))
}

#[allow(clippy::too_many_arguments)]
pub fn path_load_edge_constraint(
    var: &str,
    label: &str,
    end_node_type: &str,
    end_node_field: &str,
    min_jumps: i32,
    max_jumps: i32,
    depth: i32,
    filter: Option<&Condition>,
) -> OgmResult<Cypher> {
    check_shape(var, label, depth)?;
    validate_identifier("end node label", end_node_type)?;
    validate_identifier("end node field", end_node_field)?;
    if min_jumps < 0 || max_jumps < min_jumps {
        return Err(OgmError::validation(format!(
            "invalid jump range {}..{}",
            min_jumps, max_jumps
        )));
    }

    let pattern = format!(
        "{}, ({})-[*{}..{}]-(:{} {{{}: ${}}})",
        path_match(var, label, depth),
        var,
        min_jumps,
        max_jumps,
        end_node_type,
        end_node_field,
        end_node_field
    );
    Ok(build(&pattern, filter, var))
}

fn check_shape(var: &str, label: &str, depth: i32) -> OgmResult<()> {
    if depth < 0 {
        return Err(OgmError::validation(format!("depth must not be negative, got {}", depth)));
    }
    validate_identifier("variable", var)?;
    validate_identifier("label", label)
}

fn path_match(var: &str, label: &str, depth: i32) -> String {
    format!("MATCH p=({}:{})-[*0..{}]-()", var, label, depth)
}

fn build(pattern: &str, condition: Option<&Condition>, var: &str) -> Cypher {
    let mut text = pattern.to_string();
    if let Some(condition) = condition {
        text.push_str(&format!(" WHERE {}", condition));
    }
    text.push_str(&format!(
        " RETURN {var} {{.*}} AS {var}, \
         [x IN nodes(p) | x {{.*, _labels: labels(x)}}] AS nodes, \
         [r IN relationships(p) | {{type: type(r), start: startNode(r).uuid, end: endNode(r).uuid}}] AS edges",
        var = var
    ));
    Cypher::new(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_one() {
        let query = path_load_one("n", "Person", 2, None).unwrap();
        assert!(query
            .as_str()
            .starts_with("MATCH p=(n:Person)-[*0..2]-() WHERE n.uuid = $uuid RETURN n {.*} AS n"));
        assert!(query.as_str().contains("AS nodes"));
        assert!(query.as_str().contains("AS edges"));
    }

    #[test]
    fn test_load_one_with_filter() {
        let filter = Condition::raw("n.age > $min_age");
        let query = path_load_one("n", "Person", 1, Some(&filter)).unwrap();
        assert!(query
            .as_str()
            .contains("WHERE (n.uuid = $uuid) AND (n.age > $min_age) RETURN"));
    }

    #[test]
    fn test_load_many_zero_depth() {
        let query = path_load_many("n", "Person", 0, None).unwrap();
        assert!(query.as_str().starts_with("MATCH p=(n:Person)-[*0..0]-() RETURN"));
        assert!(!query.as_str().contains("WHERE"));
    }

    #[test]
    fn test_edge_constraint() {
        let query = path_load_edge_constraint("n", "Person", "City", "name", 1, 3, 1, None).unwrap();
        assert!(query
            .as_str()
            .starts_with("MATCH p=(n:Person)-[*0..1]-(), (n)-[*1..3]-(:City {name: $name}) RETURN"));
    }

    #[test]
    fn test_negative_depth_rejected() {
        for scope in [LoadScope::One, LoadScope::Many] {
            let err = resolve(LoadStrategy::Path, "n", "Person", -1, None, scope).unwrap_err();
            assert!(err.is_validation());
        }
        let err = path_load_edge_constraint("n", "Person", "City", "name", 0, 1, -3, None).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_invalid_jump_range() {
        let err = path_load_edge_constraint("n", "Person", "City", "name", 3, 1, 1, None).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_schema_strategy_unsupported() {
        let err = resolve(LoadStrategy::Schema, "n", "Person", 1, None, LoadScope::Many).unwrap_err();
        assert!(matches!(err, OgmError::Unsupported(_)));
    }

    #[test]
    fn test_label_injection_rejected() {
        let err = path_load_many("n", "Person) DETACH DELETE (x", 1, None).unwrap_err();
        assert!(matches!(err, OgmError::Query { .. }));
    }
}

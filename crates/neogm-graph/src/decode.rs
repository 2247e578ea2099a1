//! Row-to-object decoding.
//!
//! Load queries return three columns per path: the root's properties, the
//! nodes on the path and the edges on the path. Roots are decoded with
//! serde; every node and edge seen across all rows is gathered into one
//! [`Neighborhood`] that each root gets to hydrate itself from.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use neogm_core::{LoadedEdge, LoadedNode, Neighborhood, NodeEntity, OgmError, OgmResult};

use crate::connection::QueryResult;

const NODES_COLUMN: &str = "nodes";
const EDGES_COLUMN: &str = "edges";
const LABELS_KEY: &str = "_labels";

/// Positions of the three load columns. Columns are found by name; a
/// result without column names is read positionally.
#[derive(Debug, Clone, Copy)]
struct LoadColumns {
    root: usize,
    nodes: usize,
    edges: usize,
}

impl LoadColumns {
    fn of(result: &QueryResult) -> Self {
        let nodes = result.column_index(NODES_COLUMN).unwrap_or(1);
        let edges = result.column_index(EDGES_COLUMN).unwrap_or(2);
        let root = (0..result.columns.len().max(1))
            .find(|idx| *idx != nodes && *idx != edges)
            .unwrap_or(0);
        Self { root, nodes, edges }
    }
}

/// Decode a single-entity load. Zero rows means the entity does not exist.
pub fn decode_one<T: NodeEntity>(result: &QueryResult, id: &str) -> OgmResult<T> {
    let row = result
        .rows
        .first()
        .ok_or_else(|| OgmError::NotFound(format!("{} with uuid '{}'", T::LABEL, id)))?;

    let columns = LoadColumns::of(result);
    let neighborhood = collect_neighborhood(result, columns)?;
    let mut entity: T = from_json(root_value(row, columns)?)?;
    entity.hydrate(&neighborhood)?;
    Ok(entity)
}

/// Decode a multi-entity load, one entity per distinct root.
pub fn decode_many<T: NodeEntity>(result: &QueryResult) -> OgmResult<Vec<T>> {
    let columns = LoadColumns::of(result);
    let neighborhood = collect_neighborhood(result, columns)?;
    let mut seen = HashSet::new();
    let mut entities = Vec::new();

    for row in &result.rows {
        let root = root_value(row, columns)?;
        let key = root
            .get("uuid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| root.to_string());
        if !seen.insert(key) {
            continue;
        }

        let mut entity: T = from_json(root)?;
        entity.hydrate(&neighborhood)?;
        entities.push(entity);
    }

    Ok(entities)
}

/// Decode the rows of a hand-written query. Single-column rows decode that
/// column; wider rows decode as a map of column name to value.
pub fn decode_rows<T: DeserializeOwned>(result: &QueryResult) -> OgmResult<Vec<T>> {
    result
        .rows
        .iter()
        .map(|row| match row.as_slice() {
            [single] => from_json(single),
            values => {
                let map: Map<String, Value> = result
                    .columns
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned())
                    .collect();
                from_json(&Value::Object(map))
            }
        })
        .collect()
}

fn root_value(row: &[Value], columns: LoadColumns) -> OgmResult<&Value> {
    match row.get(columns.root) {
        Some(value @ Value::Object(_)) => Ok(value),
        Some(other) => Err(OgmError::decode(other, "root column must be a property map")),
        None => Err(OgmError::decode(&Value::Array(row.to_vec()), "row has no columns")),
    }
}

fn from_json<T: DeserializeOwned>(value: &Value) -> OgmResult<T> {
    T::deserialize(value).map_err(|e| OgmError::decode(value, e))
}

fn collect_neighborhood(result: &QueryResult, columns: LoadColumns) -> OgmResult<Neighborhood> {
    let mut neighborhood = Neighborhood::default();

    for row in &result.rows {
        for value in list_column(row, columns.nodes)? {
            if let Some(node) = loaded_node(value)? {
                neighborhood.insert_node(node);
            }
        }
        for value in list_column(row, columns.edges)? {
            if let Some(edge) = loaded_edge(value)? {
                neighborhood.insert_edge(edge);
            }
        }
    }

    Ok(neighborhood)
}

fn list_column(row: &[Value], idx: usize) -> OgmResult<&[Value]> {
    match row.get(idx) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(OgmError::decode(other, "expected a list of path elements")),
    }
}

fn loaded_node(value: &Value) -> OgmResult<Option<LoadedNode>> {
    let Value::Object(map) = value else {
        return Err(OgmError::decode(value, "path node must be a property map"));
    };

    // Nodes without a uuid cannot be linked to anything.
    let Some(uuid) = map.get("uuid").and_then(Value::as_str) else {
        return Ok(None);
    };

    let labels = match map.get(LABELS_KEY) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|l| {
                l.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| OgmError::decode(l, "label must be a string"))
            })
            .collect::<OgmResult<Vec<_>>>()?,
        _ => Vec::new(),
    };

    let mut properties = map.clone();
    properties.remove(LABELS_KEY);

    Ok(Some(LoadedNode {
        uuid: uuid.to_string(),
        labels,
        properties,
    }))
}

fn loaded_edge(value: &Value) -> OgmResult<Option<LoadedEdge>> {
    let Value::Object(map) = value else {
        return Err(OgmError::decode(value, "path edge must be a map"));
    };

    let field = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
    match (field("type"), field("start"), field("end")) {
        (Some(rel_type), Some(start), Some(end)) => Ok(Some(LoadedEdge { rel_type, start, end })),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neogm_core::{Direction, TypeFieldConfig};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Person {
        uuid: String,
        name: String,
        #[serde(default, skip_serializing)]
        friends: Vec<Person>,
    }

    impl NodeEntity for Person {
        const TYPE_NAME: &'static str = "Person";
        const LABEL: &'static str = "Person";

        fn uuid(&self) -> &str {
            &self.uuid
        }

        fn fields() -> Vec<TypeFieldConfig> {
            vec![TypeFieldConfig::new("uuid").primary_key()]
        }

        fn hydrate(&mut self, neighborhood: &Neighborhood) -> OgmResult<()> {
            self.friends = neighborhood.decode_related(&self.uuid, "KNOWS", Direction::Both)?;
            Ok(())
        }
    }

    fn path_row(root: (&str, &str), other: Option<(&str, &str)>) -> Vec<Value> {
        let root_props = json!({"uuid": root.0, "name": root.1});
        let mut nodes = vec![json!({"uuid": root.0, "name": root.1, "_labels": ["Person"]})];
        let mut edges = vec![];
        if let Some((uuid, name)) = other {
            nodes.push(json!({"uuid": uuid, "name": name, "_labels": ["Person"]}));
            edges.push(json!({"type": "KNOWS", "start": root.0, "end": uuid}));
        }
        vec![root_props, Value::Array(nodes), Value::Array(edges)]
    }

    fn result(rows: Vec<Vec<Value>>) -> QueryResult {
        QueryResult::new(&["n", "nodes", "edges"], rows)
    }

    #[test]
    fn test_decode_one_hydrates_neighbors() {
        let res = result(vec![
            path_row(("p1", "Ada"), None),
            path_row(("p1", "Ada"), Some(("p2", "Grace"))),
        ]);
        let person: Person = decode_one(&res, "p1").unwrap();
        assert_eq!(person.name, "Ada");
        assert_eq!(person.friends.len(), 1);
        assert_eq!(person.friends[0].name, "Grace");
    }

    #[test]
    fn test_decode_one_missing_is_not_found() {
        let err = decode_one::<Person>(&result(vec![]), "p1").unwrap_err();
        assert!(matches!(err, OgmError::NotFound(_)));
    }

    #[test]
    fn test_decode_many_dedupes_roots() {
        let res = result(vec![
            path_row(("p1", "Ada"), None),
            path_row(("p1", "Ada"), Some(("p2", "Grace"))),
            path_row(("p2", "Grace"), None),
        ]);
        let people: Vec<Person> = decode_many(&res).unwrap();
        assert_eq!(people.len(), 2);
        assert_eq!(people[0].uuid, "p1");
        assert_eq!(people[1].friends[0].uuid, "p1");
    }

    #[test]
    fn test_decode_error_names_value_kind() {
        let res = result(vec![vec![json!("not a map"), json!([]), json!([])]]);
        let err = decode_many::<Person>(&res).unwrap_err();
        match err {
            OgmError::Decode { kind, value, .. } => {
                assert_eq!(kind, "string");
                assert!(value.contains("not a map"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_columns_found_by_name() {
        let row = path_row(("p1", "Ada"), Some(("p2", "Grace")));
        let shuffled = QueryResult::new(
            &["edges", "n", "nodes"],
            vec![vec![row[2].clone(), row[0].clone(), row[1].clone()]],
        );
        let person: Person = decode_one(&shuffled, "p1").unwrap();
        assert_eq!(person.friends[0].uuid, "p2");
    }

    #[test]
    fn test_decode_rows_single_and_wide() {
        let single = QueryResult::new(&["name"], vec![vec![json!("Ada")], vec![json!("Grace")]]);
        let names: Vec<String> = decode_rows(&single).unwrap();
        assert_eq!(names, vec!["Ada", "Grace"]);

        #[derive(Deserialize)]
        struct Count {
            label: String,
            total: i64,
        }
        let wide = QueryResult::new(&["label", "total"], vec![vec![json!("Person"), json!(3)]]);
        let counts: Vec<Count> = decode_rows(&wide).unwrap();
        assert_eq!(counts[0].label, "Person");
        assert_eq!(counts[0].total, 3);
    }
}

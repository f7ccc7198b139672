use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::value::IndexValue;

#[derive(Debug, Clone, PartialEq)]
pub enum SortOrder {
    Asc,
    Desc,
}

// ---------------------------------------------------------------------------
// Query AST
// ---------------------------------------------------------------------------

/// BSON-style type names accepted by `$type`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JsonType {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "null" => Ok(JsonType::Null),
            "bool" => Ok(JsonType::Bool),
            "number" | "double" | "int" | "long" | "decimal" => Ok(JsonType::Number),
            "string" => Ok(JsonType::String),
            "array" => Ok(JsonType::Array),
            "object" => Ok(JsonType::Object),
            other => Err(Error::InvalidQuery(format!("unknown $type: {other}"))),
        }
    }

    fn matches(self, value: &JsonValue) -> bool {
        match self {
            JsonType::Null => value.is_null(),
            JsonType::Bool => value.is_boolean(),
            JsonType::Number => value.is_number(),
            JsonType::String => value.is_string(),
            JsonType::Array => value.is_array(),
            JsonType::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum QueryOp {
    Eq(IndexValue),
    Ne(IndexValue),
    Gt(IndexValue),
    Gte(IndexValue),
    Lt(IndexValue),
    Lte(IndexValue),
    In(Vec<IndexValue>),
    Exists(bool),
    Type(JsonType),
}

#[derive(Debug, Clone)]
pub enum Query {
    Field { field: String, op: QueryOp },
    And(Vec<Query>),
    Or(Vec<Query>),
    All, // match everything
}

// ---------------------------------------------------------------------------
// Parsing: JSON → Query AST
// ---------------------------------------------------------------------------

pub fn parse_query(query: &JsonValue) -> Result<Query> {
    let obj = query
        .as_object()
        .ok_or_else(|| Error::InvalidQuery("query must be a JSON object".into()))?;

    let mut conditions: Vec<Query> = Vec::new();

    for (key, value) in obj {
        match key.as_str() {
            "$and" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| Error::InvalidQuery("$and must be an array".into()))?;
                let subs: Result<Vec<Query>> = arr.iter().map(parse_query).collect();
                conditions.push(Query::And(subs?));
            }
            "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| Error::InvalidQuery("$or must be an array".into()))?;
                let subs: Result<Vec<Query>> = arr.iter().map(parse_query).collect();
                conditions.push(Query::Or(subs?));
            }
            field => match value.as_object() {
                Some(ops) if ops.keys().any(|k| k.starts_with('$')) => {
                    for (op_key, op_val) in ops {
                        conditions.push(Query::Field {
                            field: field.to_string(),
                            op: parse_op(op_key, op_val)?,
                        });
                    }
                }
                // Plain value or plain object: equality
                _ => conditions.push(Query::Field {
                    field: field.to_string(),
                    op: QueryOp::Eq(IndexValue::from_json(value)),
                }),
            },
        }
    }

    Ok(match conditions.len() {
        0 => Query::All,
        1 => conditions.remove(0),
        _ => Query::And(conditions),
    })
}

fn parse_op(op_key: &str, op_val: &JsonValue) -> Result<QueryOp> {
    match op_key {
        "$eq" => Ok(QueryOp::Eq(IndexValue::from_json(op_val))),
        "$ne" => Ok(QueryOp::Ne(IndexValue::from_json(op_val))),
        "$gt" => Ok(QueryOp::Gt(IndexValue::from_json(op_val))),
        "$gte" => Ok(QueryOp::Gte(IndexValue::from_json(op_val))),
        "$lt" => Ok(QueryOp::Lt(IndexValue::from_json(op_val))),
        "$lte" => Ok(QueryOp::Lte(IndexValue::from_json(op_val))),
        "$in" => {
            let arr = op_val
                .as_array()
                .ok_or_else(|| Error::InvalidQuery("$in must be an array".into()))?;
            Ok(QueryOp::In(arr.iter().map(IndexValue::from_json).collect()))
        }
        "$exists" => {
            let b = op_val
                .as_bool()
                .ok_or_else(|| Error::InvalidQuery("$exists must be a boolean".into()))?;
            Ok(QueryOp::Exists(b))
        }
        "$type" => {
            let name = op_val
                .as_str()
                .ok_or_else(|| Error::InvalidQuery("$type must be a type name".into()))?;
            Ok(QueryOp::Type(JsonType::parse(name)?))
        }
        _ => Err(Error::InvalidQuery(format!("unknown operator: {}", op_key))),
    }
}

// ---------------------------------------------------------------------------
// Filter: evaluate a query against a single document
// ---------------------------------------------------------------------------

/// A missing field fails every operator except `$exists: false`, so
/// `{"year": {"$ne": null}}` drops documents without a year.
pub fn matches_value(query: &Query, doc: &JsonValue) -> bool {
    match query {
        Query::All => true,
        Query::Field { field, op } => {
            let field_val = resolve_field_ref(doc, field);
            if let QueryOp::Exists(expected) = op {
                return field_val.is_some() == *expected;
            }
            let Some(val) = field_val else {
                return false;
            };
            if let QueryOp::Type(ty) = op {
                return ty.matches(val);
            }
            let iv = IndexValue::from_json(val);
            match op {
                QueryOp::Eq(v) => iv == *v,
                QueryOp::Ne(v) => iv != *v,
                QueryOp::Gt(v) => iv > *v,
                QueryOp::Gte(v) => iv >= *v,
                QueryOp::Lt(v) => iv < *v,
                QueryOp::Lte(v) => iv <= *v,
                QueryOp::In(vals) => vals.contains(&iv),
                QueryOp::Exists(_) | QueryOp::Type(_) => false,
            }
        }
        Query::And(subs) => subs.iter().all(|s| matches_value(s, doc)),
        Query::Or(subs) => subs.iter().any(|s| matches_value(s, doc)),
    }
}

/// Resolve a field path (with dot notation) directly on a &Value.
pub(crate) fn resolve_field_ref<'a>(data: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut current = data;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(query: JsonValue, doc: JsonValue) -> bool {
        matches_value(&parse_query(&query).unwrap(), &doc)
    }

    #[test]
    fn empty_query_matches_all() {
        assert!(check(json!({}), json!({"a": 1})));
    }

    #[test]
    fn implicit_equality() {
        assert!(check(json!({"title": "Heat"}), json!({"title": "Heat"})));
        assert!(!check(json!({"title": "Heat"}), json!({"title": "Ran"})));
    }

    #[test]
    fn ne_null_excludes_null_and_missing() {
        let q = json!({"year": {"$ne": null}});
        assert!(check(q.clone(), json!({"year": 1999})));
        assert!(!check(q.clone(), json!({"year": null})));
        assert!(!check(q, json!({"title": "no year"})));
    }

    #[test]
    fn nested_path_comparison() {
        let q = json!({"imdb.rating": {"$gte": 8}});
        assert!(check(q.clone(), json!({"imdb": {"rating": 8.4}})));
        assert!(!check(q.clone(), json!({"imdb": {"rating": 6.1}})));
        assert!(!check(q, json!({"imdb": {}})));
    }

    #[test]
    fn type_number_rejects_empty_string_rating() {
        let q = json!({"imdb.rating": {"$type": "number"}});
        assert!(check(q.clone(), json!({"imdb": {"rating": 7.2}})));
        assert!(!check(q.clone(), json!({"imdb": {"rating": ""}})));
        assert!(!check(q, json!({"imdb": {"rating": null}})));
    }

    #[test]
    fn exists_false_matches_missing() {
        assert!(check(json!({"year": {"$exists": false}}), json!({"title": "x"})));
        assert!(!check(json!({"year": {"$exists": false}}), json!({"year": 1})));
    }

    #[test]
    fn in_and_or() {
        assert!(check(json!({"g": {"$in": ["A", "B"]}}), json!({"g": "B"})));
        assert!(check(
            json!({"$or": [{"g": "Z"}, {"n": {"$lt": 3}}]}),
            json!({"g": "A", "n": 1})
        ));
    }

    #[test]
    fn unknown_operator_errors() {
        let err = parse_query(&json!({"a": {"$regex": "x"}})).unwrap_err();
        assert!(err.is_query());
    }

    #[test]
    fn unknown_type_name_errors() {
        assert!(parse_query(&json!({"a": {"$type": "timestamp"}})).is_err());
    }
}

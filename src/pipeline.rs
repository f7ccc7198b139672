use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::error::{Error, Result};
use crate::query::{self, Query, QueryOp, SortOrder};
use crate::value::IndexValue;

// ---------------------------------------------------------------------------
// Expression
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Expression {
    Literal(Value),
    FieldRef(String),
}

// ---------------------------------------------------------------------------
// Group key
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum GroupKey {
    Null,
    Single(Expression),
    Compound(Vec<(String, Expression)>),
}

// ---------------------------------------------------------------------------
// Accumulators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Accumulator {
    Sum(Expression),
    Avg(Expression),
}

enum AccumulatorState {
    Sum(f64),
    Avg { sum: f64, count: u64 },
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum ProjectionField {
    Include,
    Exclude,
    Compute(Expression),
}

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Stage {
    Match(Value),
    Group {
        key: GroupKey,
        accumulators: Vec<(String, Accumulator)>,
    },
    Sort(Vec<(String, SortOrder)>),
    Limit(u64),
    Project(Vec<(String, ProjectionField)>),
    Unwind {
        path: String,
        preserve_null: bool,
    },
    Lookup {
        from: String,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A parsed aggregation pipeline in the MongoDB stage dialect.
///
/// Supported stages: `$match`, `$group` (`$sum`, `$avg`), `$sort`, `$limit`,
/// `$project`, `$unwind` and `$lookup`. Stages run in order over an owned
/// `Vec<Value>`; `$lookup` reads foreign collections through a caller-supplied
/// function so the engine itself holds no store.
#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn resolve_field(doc: &Value, path: &str) -> Value {
    query::resolve_field_ref(doc, path)
        .cloned()
        .unwrap_or(Value::Null)
}

pub(crate) fn set_field(doc: &mut Value, path: &str, value: Value) {
    let mut current = doc;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        let Value::Object(map) = current else {
            return;
        };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        let child = map.entry(part.to_string()).or_insert_with(|| json!({}));
        if !child.is_object() {
            *child = json!({});
        }
        current = child;
    }
}

fn number_to_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn single_entry<'a>(map: &'a Map<String, Value>, what: &str) -> Result<(&'a String, &'a Value)> {
    match map.iter().next() {
        Some(entry) if map.len() == 1 => Ok(entry),
        _ => Err(Error::InvalidPipeline(format!(
            "{what} must have exactly one key"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Expression parsing & evaluation
// ---------------------------------------------------------------------------

fn parse_expression(val: &Value) -> Expression {
    match val {
        Value::String(s) if s.starts_with('$') => Expression::FieldRef(s[1..].to_string()),
        _ => Expression::Literal(val.clone()),
    }
}

impl Expression {
    /// `None` when a field reference does not resolve.
    fn eval(&self, doc: &Value) -> Option<Value> {
        match self {
            Expression::Literal(v) => Some(v.clone()),
            Expression::FieldRef(path) => query::resolve_field_ref(doc, path).cloned(),
        }
    }

    fn eval_f64(&self, doc: &Value) -> Option<f64> {
        match self {
            Expression::Literal(v) => v.as_f64(),
            Expression::FieldRef(path) => query::resolve_field_ref(doc, path)?.as_f64(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage parsing helpers
// ---------------------------------------------------------------------------

fn parse_accumulator(val: &Value) -> Result<Accumulator> {
    let obj = val
        .as_object()
        .ok_or_else(|| Error::InvalidPipeline("accumulator must be an object".into()))?;
    let (op, arg) = single_entry(obj, "accumulator")?;
    match op.as_str() {
        "$sum" => Ok(Accumulator::Sum(parse_expression(arg))),
        "$avg" => Ok(Accumulator::Avg(parse_expression(arg))),
        _ => Err(Error::InvalidPipeline(format!(
            "unknown accumulator: {}",
            op
        ))),
    }
}

fn parse_group_stage(val: &Value) -> Result<Stage> {
    let obj = val
        .as_object()
        .ok_or_else(|| Error::InvalidPipeline("$group must be an object".into()))?;

    let id_val = obj
        .get("_id")
        .ok_or_else(|| Error::InvalidPipeline("$group requires '_id' field".into()))?;

    let key = match id_val {
        Value::Null => GroupKey::Null,
        Value::Object(map) => {
            if map.keys().any(|k| k.starts_with('$')) {
                return Err(Error::InvalidPipeline(
                    "$group '_id' expressions are not supported".into(),
                ));
            }
            GroupKey::Compound(
                map.iter()
                    .map(|(k, v)| (k.clone(), parse_expression(v)))
                    .collect(),
            )
        }
        other => GroupKey::Single(parse_expression(other)),
    };

    let mut accumulators = Vec::new();
    for (name, spec) in obj {
        if name == "_id" {
            continue;
        }
        accumulators.push((name.clone(), parse_accumulator(spec)?));
    }

    Ok(Stage::Group { key, accumulators })
}

fn parse_sort(val: &Value) -> Result<Vec<(String, SortOrder)>> {
    let obj = val
        .as_object()
        .ok_or_else(|| Error::InvalidPipeline("$sort must be an object".into()))?;
    if obj.is_empty() {
        return Err(Error::InvalidPipeline("$sort needs at least one key".into()));
    }
    let mut fields = Vec::new();
    for (field, dir) in obj {
        let order = match dir.as_i64() {
            Some(1) => SortOrder::Asc,
            Some(-1) => SortOrder::Desc,
            _ => {
                return Err(Error::InvalidPipeline(
                    "sort direction must be 1 or -1".into(),
                ));
            }
        };
        fields.push((field.clone(), order));
    }
    Ok(fields)
}

fn parse_project(val: &Value) -> Result<Vec<(String, ProjectionField)>> {
    let obj = val
        .as_object()
        .ok_or_else(|| Error::InvalidPipeline("$project must be an object".into()))?;
    let mut fields = Vec::new();
    for (field, spec) in obj {
        let pf = match spec {
            Value::Number(n) if n.as_i64() == Some(1) => ProjectionField::Include,
            Value::Number(n) if n.as_i64() == Some(0) => ProjectionField::Exclude,
            Value::Bool(true) => ProjectionField::Include,
            Value::Bool(false) => ProjectionField::Exclude,
            _ => ProjectionField::Compute(parse_expression(spec)),
        };
        fields.push((field.clone(), pf));
    }
    Ok(fields)
}

fn parse_unwind(val: &Value) -> Result<(String, bool)> {
    match val {
        Value::String(s) if s.starts_with('$') => Ok((s[1..].to_string(), false)),
        Value::Object(obj) => {
            let path = obj
                .get("path")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::InvalidPipeline("$unwind requires 'path' string".into()))?;
            let Some(path) = path.strip_prefix('$') else {
                return Err(Error::InvalidPipeline(
                    "$unwind path must start with $".into(),
                ));
            };
            let preserve = obj
                .get("preserveNullAndEmptyArrays")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            Ok((path.to_string(), preserve))
        }
        _ => Err(Error::InvalidPipeline(
            "$unwind must be a string or object".into(),
        )),
    }
}

fn parse_lookup(val: &Value) -> Result<Stage> {
    let obj = val
        .as_object()
        .ok_or_else(|| Error::InvalidPipeline("$lookup must be an object".into()))?;
    let field = |name: &str| -> Result<String> {
        obj.get(name)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidPipeline(format!("$lookup requires '{name}' string")))
    };
    Ok(Stage::Lookup {
        from: field("from")?,
        local_field: field("localField")?,
        foreign_field: field("foreignField")?,
        as_field: field("as")?,
    })
}

// ---------------------------------------------------------------------------
// Stage execution
// ---------------------------------------------------------------------------

fn exec_match(docs: Vec<Value>, match_val: &Value) -> Result<Vec<Value>> {
    let query = query::parse_query(match_val)?;
    Ok(docs
        .into_iter()
        .filter(|doc| query::matches_value(&query, doc))
        .collect())
}

fn exec_group(
    docs: Vec<Value>,
    key: &GroupKey,
    accumulators: &[(String, Accumulator)],
) -> Vec<Value> {
    // Groups are emitted in first-seen order.
    let mut groups: Vec<(Value, Vec<AccumulatorState>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for doc in &docs {
        let key_val = match key {
            GroupKey::Null => Value::Null,
            GroupKey::Single(expr) => expr.eval(doc).unwrap_or(Value::Null),
            GroupKey::Compound(fields) => {
                let mut map = Map::new();
                for (name, expr) in fields {
                    map.insert(name.clone(), expr.eval(doc).unwrap_or(Value::Null));
                }
                Value::Object(map)
            }
        };

        let pos = *positions.entry(key_val.to_string()).or_insert_with(|| {
            let initial = accumulators
                .iter()
                .map(|(_, acc)| match acc {
                    Accumulator::Sum(_) => AccumulatorState::Sum(0.0),
                    Accumulator::Avg(_) => AccumulatorState::Avg { sum: 0.0, count: 0 },
                })
                .collect();
            groups.push((key_val, initial));
            groups.len() - 1
        });
        let states = &mut groups[pos].1;

        for ((_, acc), state) in accumulators.iter().zip(states.iter_mut()) {
            match (acc, state) {
                (Accumulator::Sum(expr), AccumulatorState::Sum(s)) => {
                    if let Some(n) = expr.eval_f64(doc) {
                        *s += n;
                    }
                }
                (Accumulator::Avg(expr), AccumulatorState::Avg { sum, count }) => {
                    if let Some(n) = expr.eval_f64(doc) {
                        *sum += n;
                        *count += 1;
                    }
                }
                _ => {}
            }
        }
    }

    groups
        .into_iter()
        .map(|(key_val, states)| {
            let mut doc = Map::new();
            doc.insert("_id".to_string(), key_val);
            for ((name, _), state) in accumulators.iter().zip(states) {
                let val = match state {
                    AccumulatorState::Sum(s) => number_to_value(s),
                    AccumulatorState::Avg { sum, count } => {
                        if count == 0 {
                            Value::Null
                        } else {
                            number_to_value(sum / count as f64)
                        }
                    }
                };
                doc.insert(name.clone(), val);
            }
            Value::Object(doc)
        })
        .collect()
}

/// Stable: documents that compare equal on every key keep their input order.
fn exec_sort(mut docs: Vec<Value>, sort_fields: &[(String, SortOrder)]) -> Vec<Value> {
    docs.sort_by(|a, b| {
        for (field, order) in sort_fields {
            let aiv = IndexValue::from_json(&resolve_field(a, field));
            let biv = IndexValue::from_json(&resolve_field(b, field));
            let cmp = match order {
                SortOrder::Asc => aiv.cmp(&biv),
                SortOrder::Desc => biv.cmp(&aiv),
            };
            if cmp != std::cmp::Ordering::Equal {
                return cmp;
            }
        }
        std::cmp::Ordering::Equal
    });
    docs
}

fn exec_limit(docs: Vec<Value>, n: u64) -> Vec<Value> {
    docs.into_iter().take(n as usize).collect()
}

fn exec_project(docs: Vec<Value>, fields: &[(String, ProjectionField)]) -> Vec<Value> {
    let inclusion_mode = fields.iter().any(|(name, pf)| match pf {
        ProjectionField::Include => name != "_id",
        ProjectionField::Compute(_) => true,
        ProjectionField::Exclude => false,
    });
    let id_excluded = fields
        .iter()
        .any(|(name, pf)| name == "_id" && matches!(pf, ProjectionField::Exclude));

    docs.into_iter()
        .map(|doc| {
            let mut result = Map::new();

            if inclusion_mode {
                if !id_excluded {
                    if let Some(id_val) = doc.get("_id") {
                        result.insert("_id".to_string(), id_val.clone());
                    }
                }
                for (name, pf) in fields {
                    // Unresolved paths are omitted rather than set to null
                    let val = match pf {
                        ProjectionField::Include => query::resolve_field_ref(&doc, name).cloned(),
                        ProjectionField::Compute(expr) => expr.eval(&doc),
                        ProjectionField::Exclude => None,
                    };
                    if let Some(val) = val {
                        result.insert(name.clone(), val);
                    }
                }
            } else {
                if let Value::Object(map) = &doc {
                    result = map.clone();
                }
                for (name, _) in fields {
                    result.remove(name.as_str());
                }
            }

            Value::Object(result)
        })
        .collect()
}

fn exec_unwind(docs: Vec<Value>, path: &str, preserve_null: bool) -> Vec<Value> {
    let mut result = Vec::new();
    for doc in docs {
        match resolve_field(&doc, path) {
            Value::Array(arr) if arr.is_empty() => {
                if preserve_null {
                    result.push(doc);
                }
            }
            Value::Array(arr) => {
                for item in arr {
                    let mut new_doc = doc.clone();
                    set_field(&mut new_doc, path, item);
                    result.push(new_doc);
                }
            }
            Value::Null => {
                if preserve_null {
                    result.push(doc);
                }
            }
            // Non-array, non-null: pass through unchanged
            _ => result.push(doc),
        }
    }
    result
}

fn exec_lookup<F>(
    docs: Vec<Value>,
    from: &str,
    local_field: &str,
    foreign_field: &str,
    as_field: &str,
    lookup_fn: &F,
) -> Result<Vec<Value>>
where
    F: Fn(&str, &Query) -> Result<Vec<Value>>,
{
    let mut result = Vec::with_capacity(docs.len());
    for mut doc in docs {
        let local_val = resolve_field(&doc, local_field);
        let query = Query::Field {
            field: foreign_field.to_string(),
            op: QueryOp::Eq(IndexValue::from_json(&local_val)),
        };
        let foreign_docs = lookup_fn(from, &query)?;
        set_field(&mut doc, as_field, Value::Array(foreign_docs));
        result.push(doc);
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Pipeline parsing & execution
// ---------------------------------------------------------------------------

impl Pipeline {
    pub fn parse(pipeline_json: &Value) -> Result<Self> {
        let arr = pipeline_json
            .as_array()
            .ok_or_else(|| Error::InvalidPipeline("pipeline must be an array".into()))?;

        let mut stages = Vec::with_capacity(arr.len());
        for stage_val in arr {
            let obj = stage_val.as_object().ok_or_else(|| {
                Error::InvalidPipeline("each pipeline stage must be an object".into())
            })?;
            let (stage_name, stage_body) = single_entry(obj, "each pipeline stage")?;

            let stage = match stage_name.as_str() {
                "$match" => {
                    // Validate eagerly so malformed filters fail at parse time
                    query::parse_query(stage_body)?;
                    Stage::Match(stage_body.clone())
                }
                "$group" => parse_group_stage(stage_body)?,
                "$sort" => Stage::Sort(parse_sort(stage_body)?),
                "$limit" => {
                    let n = stage_body
                        .as_u64()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| {
                            Error::InvalidPipeline("$limit must be a positive integer".into())
                        })?;
                    Stage::Limit(n)
                }
                "$project" => Stage::Project(parse_project(stage_body)?),
                "$unwind" => {
                    let (path, preserve_null) = parse_unwind(stage_body)?;
                    Stage::Unwind {
                        path,
                        preserve_null,
                    }
                }
                "$lookup" => parse_lookup(stage_body)?,
                _ => {
                    return Err(Error::InvalidPipeline(format!(
                        "unknown stage: {}",
                        stage_name
                    )));
                }
            };
            stages.push(stage);
        }

        Ok(Pipeline { stages })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// If the first stage is $match, return its query value and the index to
    /// start execution from (1). Otherwise return (None, 0).
    pub fn take_leading_match(&self) -> (Option<&Value>, usize) {
        if let Some(Stage::Match(val)) = self.stages.first() {
            (Some(val), 1)
        } else {
            (None, 0)
        }
    }

    /// Execute pipeline stages starting from `start` index.
    pub fn execute_from<F>(&self, start: usize, docs: Vec<Value>, lookup_fn: &F) -> Result<Vec<Value>>
    where
        F: Fn(&str, &Query) -> Result<Vec<Value>>,
    {
        let mut current = docs;
        for stage in self.stages.iter().skip(start) {
            current = match stage {
                Stage::Match(val) => exec_match(current, val)?,
                Stage::Group { key, accumulators } => exec_group(current, key, accumulators),
                Stage::Sort(fields) => exec_sort(current, fields),
                Stage::Limit(n) => exec_limit(current, *n),
                Stage::Project(fields) => exec_project(current, fields),
                Stage::Unwind {
                    path,
                    preserve_null,
                } => exec_unwind(current, path, *preserve_null),
                Stage::Lookup {
                    from,
                    local_field,
                    foreign_field,
                    as_field,
                } => exec_lookup(current, from, local_field, foreign_field, as_field, lookup_fn)?,
            };
        }
        Ok(current)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Helper: no-op lookup function for tests that don't use $lookup
    fn no_lookup(_col: &str, _q: &Query) -> Result<Vec<Value>> {
        Ok(vec![])
    }

    fn run(pipeline: Value, docs: Vec<Value>) -> Vec<Value> {
        Pipeline::parse(&pipeline)
            .unwrap()
            .execute_from(0, docs, &no_lookup)
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // $group
    // -----------------------------------------------------------------------

    #[test]
    fn group_sum_literal_counts_rows() {
        let result = run(
            json!([{"$group": {"_id": "$cat", "count": {"$sum": 1}}}]),
            vec![json!({"cat": "A"}), json!({"cat": "A"}), json!({"cat": "B"})],
        );
        assert_eq!(result, vec![
            json!({"_id": "A", "count": 2}),
            json!({"_id": "B", "count": 1}),
        ]);
    }

    #[test]
    fn group_avg_ignores_non_numeric() {
        let result = run(
            json!([{"$group": {"_id": "$y", "avg": {"$avg": "$r"}}}]),
            vec![
                json!({"y": 1999, "r": 6.0}),
                json!({"y": 1999, "r": ""}),
                json!({"y": 1999, "r": 8.0}),
                json!({"y": 2000, "r": "n/a"}),
            ],
        );
        assert_eq!(result[0]["avg"], json!(7));
        assert_eq!(result[1]["avg"], Value::Null);
    }

    #[test]
    fn group_keeps_string_and_number_keys_apart() {
        let result = run(
            json!([{"$group": {"_id": "$year", "n": {"$sum": 1}}}]),
            vec![json!({"year": 1999}), json!({"year": "1999"}), json!({"year": 1999})],
        );
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], json!({"_id": 1999, "n": 2}));
        assert_eq!(result[1], json!({"_id": "1999", "n": 1}));
    }

    #[test]
    fn group_null_and_compound_keys() {
        let docs = vec![
            json!({"a": 1, "b": "x", "v": 2}),
            json!({"a": 1, "b": "y", "v": 3}),
            json!({"a": 1, "b": "x", "v": 5}),
        ];
        let total = run(
            json!([{"$group": {"_id": null, "t": {"$sum": "$v"}}}]),
            docs.clone(),
        );
        assert_eq!(total, vec![json!({"_id": null, "t": 10})]);

        let compound = run(
            json!([{"$group": {"_id": {"a": "$a", "b": "$b"}, "t": {"$sum": "$v"}}}]),
            docs,
        );
        assert_eq!(compound.len(), 2);
        assert_eq!(compound[0]["_id"], json!({"a": 1, "b": "x"}));
        assert_eq!(compound[0]["t"], json!(7));
    }

    // -----------------------------------------------------------------------
    // $sort / $limit
    // -----------------------------------------------------------------------

    #[test]
    fn sort_desc_places_nulls_last() {
        let result = exec_sort(
            vec![json!({"r": null}), json!({"r": 7.5}), json!({}), json!({"r": 9.1})],
            &[("r".into(), SortOrder::Desc)],
        );
        assert_eq!(result[0]["r"], json!(9.1));
        assert_eq!(result[1]["r"], json!(7.5));
        assert!(result[2].get("r").is_none_or(Value::is_null));
        assert!(result[3].get("r").is_none_or(Value::is_null));
    }

    #[test]
    fn sort_secondary_key_breaks_ties() {
        let result = exec_sort(
            vec![
                json!({"_id": "B", "count": 1}),
                json!({"_id": "C", "count": 2}),
                json!({"_id": "A", "count": 1}),
            ],
            &[("count".into(), SortOrder::Desc), ("_id".into(), SortOrder::Asc)],
        );
        let ids: Vec<_> = result.iter().map(|d| d["_id"].clone()).collect();
        assert_eq!(ids, vec![json!("C"), json!("A"), json!("B")]);
    }

    #[test]
    fn sort_is_stable_on_ties() {
        let result = exec_sort(
            vec![json!({"k": 1, "i": 0}), json!({"k": 0, "i": 1}), json!({"k": 1, "i": 2})],
            &[("k".into(), SortOrder::Desc)],
        );
        assert_eq!(result[0]["i"], 0);
        assert_eq!(result[1]["i"], 2);
    }

    #[test]
    fn limit_larger_than_input() {
        let docs: Vec<Value> = (0..5).map(|i| json!({"n": i})).collect();
        assert_eq!(exec_limit(docs, 20).len(), 5);
    }

    // -----------------------------------------------------------------------
    // $project
    // -----------------------------------------------------------------------

    #[test]
    fn project_computed_nested_ref() {
        let result = run(
            json!([{"$project": {"title": 1, "rating": "$imdb.rating"}}]),
            vec![json!({"_id": 1, "title": "Heat", "year": 1995, "imdb": {"rating": 8.2}})],
        );
        assert_eq!(result[0], json!({"_id": 1, "title": "Heat", "rating": 8.2}));
    }

    #[test]
    fn project_omits_unresolved_paths() {
        let result = run(
            json!([{"$project": {"title": "$movie.title", "count": 1}}]),
            vec![json!({"_id": 1, "count": 3, "movie": {}})],
        );
        assert_eq!(result[0], json!({"_id": 1, "count": 3}));
    }

    #[test]
    fn project_exclusion_mode() {
        let result = run(
            json!([{"$project": {"plot": 0}}]),
            vec![json!({"_id": 1, "title": "Heat", "plot": "long"})],
        );
        assert_eq!(result[0], json!({"_id": 1, "title": "Heat"}));
    }

    // -----------------------------------------------------------------------
    // $unwind
    // -----------------------------------------------------------------------

    #[test]
    fn unwind_array() {
        let result = exec_unwind(vec![json!({"t": "x", "genres": ["A", "B"]})], "genres", false);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0]["genres"], "A");
        assert_eq!(result[1]["genres"], "B");
        assert_eq!(result[1]["t"], "x");
    }

    #[test]
    fn unwind_drops_empty_null_and_missing() {
        let docs = vec![json!({"genres": []}), json!({"genres": null}), json!({})];
        assert!(exec_unwind(docs.clone(), "genres", false).is_empty());
        assert_eq!(exec_unwind(docs, "genres", true).len(), 3);
    }

    #[test]
    fn unwind_scalar_passthrough() {
        let result = exec_unwind(vec![json!({"genres": "Drama"})], "genres", false);
        assert_eq!(result, vec![json!({"genres": "Drama"})]);
    }

    // -----------------------------------------------------------------------
    // $lookup
    // -----------------------------------------------------------------------

    #[test]
    fn lookup_then_unwind_is_inner_join() {
        let pipeline = Pipeline::parse(&json!([
            {"$lookup": {"from": "movies", "localField": "_id", "foreignField": "_id", "as": "movie"}},
            {"$unwind": "$movie"}
        ]))
        .unwrap();

        let movies = [json!({"_id": "m1", "title": "Heat"})];
        let lookup = |from: &str, q: &Query| -> Result<Vec<Value>> {
            assert_eq!(from, "movies");
            Ok(movies
                .iter()
                .filter(|m| query::matches_value(q, m))
                .cloned()
                .collect())
        };

        let docs = vec![json!({"_id": "m1", "count": 4}), json!({"_id": "gone", "count": 9})];
        let result = pipeline.execute_from(0, docs, &lookup).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["movie"]["title"], "Heat");
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    #[test]
    fn parse_errors_are_query_errors() {
        for bad in [
            json!({"$match": {}}),
            json!(["not an object"]),
            json!([{"$match": {}, "$sort": {"a": 1}}]),
            json!([{"$unknown": {}}]),
            json!([{"$group": {"total": {"$sum": "$v"}}}]),
            json!([{"$group": {"_id": null, "x": {"$push": "$v"}}}]),
            json!([{"$sort": {"a": 2}}]),
            json!([{"$limit": 0}]),
            json!([{"$unwind": "genres"}]),
            json!([{"$lookup": {"from": "movies"}}]),
            json!([{"$match": {"a": {"$where": "x"}}}]),
        ] {
            let err = Pipeline::parse(&bad).unwrap_err();
            assert!(err.is_query(), "{bad} -> {err}");
        }
    }

    #[test]
    fn leading_match_is_detected() {
        let pipeline = Pipeline::parse(&json!([
            {"$match": {"year": {"$ne": null}}},
            {"$sort": {"year": 1}}
        ]))
        .unwrap();
        let (leading, start) = pipeline.take_leading_match();
        assert_eq!(leading, Some(&json!({"year": {"$ne": null}})));
        assert_eq!(start, 1);
        assert_eq!(pipeline.len(), 2);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let result = run(
            json!([
                {"$unwind": "$genres"},
                {"$group": {"_id": "$genres", "count": {"$sum": 1}}},
                {"$sort": {"count": -1}}
            ]),
            vec![],
        );
        assert!(result.is_empty());
    }
}

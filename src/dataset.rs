//! Loading exported collections (mongoexport / JSON arrays) into a
//! [`MemoryStore`].

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::memory::MemoryStore;

/// Load every `*.json` / `*.jsonl` file in `dir` as a collection named after
/// the file stem.
pub fn load_dir(dir: &Path) -> Result<MemoryStore> {
    let mut store = MemoryStore::new();
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("json" | "jsonl")
                )
        })
        .collect();
    entries.sort();

    for path in entries {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let text = fs::read_to_string(&path)?;
        let docs = parse_documents(&text).map_err(|e| {
            Error::DataShape(format!("{}: {e}", path.display()))
        })?;
        let n = store.insert_many(name, docs)?;
        debug!(collection = name, documents = n, "loaded collection");
    }

    info!(dir = %dir.display(), collections = ?store.list_collections(), "dataset loaded");
    Ok(store)
}

/// Parse either a JSON array of documents or one document per line.
pub fn parse_documents(text: &str) -> Result<Vec<Value>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        let Value::Array(items) = serde_json::from_str::<Value>(trimmed)? else {
            return Err(Error::DataShape("expected a JSON array".into()));
        };
        return Ok(items.into_iter().map(normalize_extended_json).collect());
    }

    let mut docs = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let doc: Value = serde_json::from_str(line).map_err(|e| {
            Error::DataShape(format!("line {}: {e}", lineno + 1))
        })?;
        docs.push(normalize_extended_json(doc));
    }
    Ok(docs)
}

/// Unwrap MongoDB Extended JSON type wrappers into plain JSON values.
///
/// `{"$oid": "..."}` becomes the hex string, `{"$date": ...}` the ISO string
/// (or millisecond number), and `$numberInt` / `$numberLong` /
/// `$numberDouble` / `$numberDecimal` become numbers. Unparseable numeric
/// wrappers (`"NaN"`, `"Infinity"`) become null.
pub fn normalize_extended_json(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            Value::Array(items.into_iter().map(normalize_extended_json).collect())
        }
        Value::Object(map) => match unwrap_wrapper(&map) {
            Some(plain) => plain,
            None => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, normalize_extended_json(v)))
                    .collect(),
            ),
        },
        other => other,
    }
}

fn unwrap_wrapper(map: &Map<String, Value>) -> Option<Value> {
    if map.len() != 1 {
        return None;
    }
    let (key, inner) = map.iter().next()?;
    match key.as_str() {
        "$oid" => inner.as_str().map(|s| Value::String(s.to_string())),
        "$date" => match inner {
            Value::String(_) | Value::Number(_) => Some(inner.clone()),
            // canonical form: {"$date": {"$numberLong": "..."}}
            Value::Object(_) => Some(normalize_extended_json(inner.clone())),
            _ => None,
        },
        "$numberInt" | "$numberLong" => {
            let s = inner.as_str()?;
            Some(s.parse::<i64>().map(Value::from).unwrap_or(Value::Null))
        }
        "$numberDouble" | "$numberDecimal" => {
            let s = inner.as_str()?;
            Some(
                s.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            )
        }
        _ => None,
    }
}

use std::collections::{HashMap, HashSet};

use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::query::{self, Query};
use crate::store::DocumentStore;

/// In-process document store backed by plain vectors.
///
/// Collections are created on first insert. `_id` is unique per collection.
/// Documents without one receive the next free sequential integer id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<Value>>,
    ids: HashMap<String, HashSet<String>>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, collection: &str, mut doc: Value) -> Result<()> {
        let map = doc.as_object_mut().ok_or(Error::NotAnObject)?;
        let used = self.ids.entry(collection.to_string()).or_default();
        match map.get("_id") {
            Some(id) => {
                let key = id_key(id);
                if used.contains(&key) {
                    return Err(Error::DuplicateId {
                        collection: collection.to_string(),
                        id: key,
                    });
                }
                used.insert(key);
            }
            None => {
                let id = loop {
                    self.next_id += 1;
                    if !used.contains(&self.next_id.to_string()) {
                        break self.next_id;
                    }
                };
                used.insert(id.to_string());
                map.insert("_id".to_string(), json!(id));
            }
        }
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(())
    }

    pub fn insert_many(&mut self, collection: &str, docs: Vec<Value>) -> Result<usize> {
        let n = docs.len();
        for doc in docs {
            self.insert(collection, doc)?;
        }
        Ok(n)
    }

    /// List all collection names, sorted.
    pub fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, Vec::len)
    }

    pub fn find(&self, collection: &str, query: &Value) -> Result<Vec<Value>> {
        let query = query::parse_query(query)?;
        Ok(self.scan(collection, &query))
    }

    fn scan(&self, collection: &str, query: &Query) -> Vec<Value> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| query::matches_value(query, doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Uniqueness key for an `_id`. Whole floats share a key with the equal
/// integer, since `$lookup` equality treats `1` and `1.0` as the same value.
fn id_key(id: &Value) -> String {
    match id.as_f64() {
        Some(f) if id.is_f64() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            (f as i64).to_string()
        }
        _ => id.to_string(),
    }
}

impl DocumentStore for MemoryStore {
    fn aggregate(&self, collection: &str, pipeline_json: &Value) -> Result<Vec<Value>> {
        let pipeline = Pipeline::parse(pipeline_json)?;
        let (leading_match, start_idx) = pipeline.take_leading_match();

        let initial_docs = match leading_match {
            Some(q) => self.find(collection, q)?,
            None => self.scan(collection, &Query::All),
        };

        let lookup_fn = |foreign: &str, query: &Query| -> Result<Vec<Value>> {
            Ok(self.scan(foreign, query))
        };

        let result = pipeline.execute_from(start_idx, initial_docs, &lookup_fn)?;
        debug!(collection, stages = pipeline.len(), rows = result.len(), "aggregate");
        Ok(result)
    }

    fn count_documents(&self, collection: &str) -> Result<u64> {
        Ok(self.count(collection) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .insert_many(
                "movies",
                vec![
                    json!({"_id": "m1", "title": "Heat", "year": 1995}),
                    json!({"_id": "m2", "title": "Ran", "year": 1985}),
                    json!({"title": "Untitled"}),
                ],
            )
            .unwrap();
        store
    }

    #[test]
    fn insert_assigns_missing_ids() {
        let store = store();
        let untitled = store.find("movies", &json!({"title": "Untitled"})).unwrap();
        assert_eq!(untitled[0]["_id"], json!(1));
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let mut store = MemoryStore::new();
        store.insert("movies", json!({"title": "auto"})).unwrap();
        let err = store
            .insert("movies", json!({"_id": 1, "title": "explicit"}))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateId { ref id, .. } if id == "1"), "{err}");
        assert!(matches!(
            store.insert("movies", json!({"_id": 1.0})),
            Err(Error::DuplicateId { .. })
        ));
        assert_eq!(store.count("movies"), 1);

        // same id in another collection is fine
        store.insert("users", json!({"_id": 1})).unwrap();
    }

    #[test]
    fn generated_ids_skip_explicit_ones() {
        let mut store = MemoryStore::new();
        store.insert("movies", json!({"_id": 1, "title": "explicit"})).unwrap();
        store.insert("movies", json!({"title": "auto"})).unwrap();
        let auto = store.find("movies", &json!({"title": "auto"})).unwrap();
        assert_eq!(auto[0]["_id"], json!(2));
    }

    #[test]
    fn lookup_joins_one_movie_per_comment_group() {
        let mut store = MemoryStore::new();
        store.insert("movies", json!({"_id": 1, "title": "explicit"})).unwrap();
        store.insert("movies", json!({"title": "auto"})).unwrap();
        store.insert("comments", json!({"movie_id": 1})).unwrap();
        let rows = crate::analytics::most_commented_movies(&store, 20).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "explicit");
    }

    #[test]
    fn insert_rejects_non_objects() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.insert("movies", json!([1, 2])),
            Err(Error::NotAnObject)
        ));
    }

    #[test]
    fn unknown_collection_is_empty() {
        let store = store();
        assert_eq!(store.count_documents("nope").unwrap(), 0);
        assert!(store.aggregate("nope", &json!([{"$sort": {"a": 1}}])).unwrap().is_empty());
    }

    #[test]
    fn aggregate_pushes_down_leading_match() {
        let store = store();
        let result = store
            .aggregate(
                "movies",
                &json!([
                    {"$match": {"year": {"$gte": 1990}}},
                    {"$project": {"title": 1, "_id": 0}}
                ]),
            )
            .unwrap();
        assert_eq!(result, vec![json!({"title": "Heat"})]);
    }

    #[test]
    fn aggregate_lookup_reads_same_store() {
        let mut store = store();
        store
            .insert("comments", json!({"movie_id": "m2", "text": "wow"}))
            .unwrap();
        let result = store
            .aggregate(
                "comments",
                &json!([
                    {"$lookup": {"from": "movies", "localField": "movie_id", "foreignField": "_id", "as": "movie"}},
                    {"$unwind": "$movie"},
                    {"$project": {"_id": 0, "title": "$movie.title"}}
                ]),
            )
            .unwrap();
        assert_eq!(result, vec![json!({"title": "Ran"})]);
    }

    #[test]
    fn list_collections_sorted() {
        let mut store = store();
        store.insert("comments", json!({})).unwrap();
        assert_eq!(store.list_collections(), vec!["comments", "movies"]);
    }
}

use std::fmt::Debug;

use serde_json::Value;

use crate::error::Result;

pub const MOVIES: &str = "movies";
pub const COMMENTS: &str = "comments";
pub const USERS: &str = "users";

/// Read-only access to a document store that understands the aggregation
/// pipeline dialect.
///
/// Every call is synchronous and returns the complete result set. An unknown
/// collection behaves like an empty one.
pub trait DocumentStore: Debug {
    /// Run `pipeline` (a JSON array of stages) against `collection`.
    fn aggregate(&self, collection: &str, pipeline: &Value) -> Result<Vec<Value>>;

    /// Number of documents in `collection`.
    fn count_documents(&self, collection: &str) -> Result<u64>;
}

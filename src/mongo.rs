//! Remote store backed by the MongoDB driver's blocking API.

use mongodb::bson::{self, Bson, Document, doc};
use mongodb::error::ErrorKind;
use mongodb::sync::{Client, Database};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::MongoSettings;
use crate::error::{Error, Result};
use crate::store::DocumentStore;

pub struct MongoStore {
    db: Database,
}

impl std::fmt::Debug for MongoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoStore")
            .field("database", &self.db.name())
            .finish()
    }
}

impl MongoStore {
    /// Build a client and verify it with a `ping`, so an unreachable
    /// endpoint or rejected credentials fail here rather than on first query.
    pub fn connect(settings: &MongoSettings) -> Result<Self> {
        let client = Client::with_uri_str(settings.connection_uri()).map_err(classify)?;
        let db = client.database(&settings.database);
        db.run_command(doc! { "ping": 1 }, None)
            .map_err(classify)?;
        info!(
            uri = %settings.redacted_uri(),
            database = %settings.database,
            "connected to document store"
        );
        Ok(Self { db })
    }
}

impl DocumentStore for MongoStore {
    fn aggregate(&self, collection: &str, pipeline: &Value) -> Result<Vec<Value>> {
        let stages = to_stages(pipeline)?;
        let cursor = self
            .db
            .collection::<Document>(collection)
            .aggregate(stages, None)
            .map_err(classify)?;

        let mut rows = Vec::new();
        for doc in cursor {
            let doc = doc.map_err(classify)?;
            rows.push(Bson::Document(doc).into_relaxed_extjson());
        }
        debug!(collection, rows = rows.len(), "aggregate");
        Ok(rows)
    }

    fn count_documents(&self, collection: &str) -> Result<u64> {
        self.db
            .collection::<Document>(collection)
            .count_documents(None, None)
            .map_err(classify)
    }
}

fn to_stages(pipeline: &Value) -> Result<Vec<Document>> {
    let stages = pipeline
        .as_array()
        .ok_or_else(|| Error::InvalidPipeline("pipeline must be an array".into()))?;
    stages
        .iter()
        .map(|stage| {
            bson::to_document(stage)
                .map_err(|e| Error::InvalidPipeline(format!("stage {stage}: {e}")))
        })
        .collect()
}

/// Network, DNS, TLS, server-selection and authentication failures are
/// connection errors; anything else the server rejects is a query error.
fn classify(err: mongodb::error::Error) -> Error {
    match err.kind.as_ref() {
        ErrorKind::Authentication { .. }
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::Io(_)
        | ErrorKind::InvalidTlsConfig { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => Error::Connection(err.to_string()),
        ErrorKind::InvalidArgument { .. } => Error::Config(err.to_string()),
        _ => Error::InvalidQuery(err.to_string()),
    }
}

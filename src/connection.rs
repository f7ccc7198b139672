use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::dataset;
use crate::error::{Error, Result};
use crate::store::DocumentStore;

pub type StoreHandle = Arc<dyn DocumentStore + Send + Sync>;

/// Lazily opens the configured store once and hands out the same handle on
/// every later call.
///
/// Owned by the process entry point and passed by reference to whatever runs
/// a render cycle. A failed open is not remembered, so the next call retries.
/// There is no explicit close; the handle lives until the provider is dropped.
pub struct ConnectionProvider {
    config: StoreConfig,
    handle: OnceLock<StoreHandle>,
}

impl ConnectionProvider {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            handle: OnceLock::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.handle.get().is_some()
    }

    pub fn get_connection(&self) -> Result<StoreHandle> {
        if let Some(handle) = self.handle.get() {
            debug!("reusing store handle");
            return Ok(Arc::clone(handle));
        }
        let opened = open(&self.config).inspect_err(|e| warn!(error = %e, "store open failed"))?;
        Ok(Arc::clone(self.handle.get_or_init(|| opened)))
    }
}

fn open(config: &StoreConfig) -> Result<StoreHandle> {
    config.validate()?;
    match config {
        StoreConfig::Directory { path } => {
            let store = dataset::load_dir(path).map_err(|e| {
                Error::Connection(format!("dataset {}: {e}", path.display()))
            })?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "mongo")]
        StoreConfig::Mongo(settings) => Ok(Arc::new(crate::mongo::MongoStore::connect(settings)?)),
        #[cfg(not(feature = "mongo"))]
        StoreConfig::Mongo(_) => Err(Error::Connection(
            "built without the `mongo` feature".into(),
        )),
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("unexpected result shape: {0}")]
    DataShape(String),

    #[error("document must be a JSON object")]
    NotAnObject,

    #[error("duplicate _id {id} in collection '{collection}'")]
    DuplicateId { collection: String, id: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Store unreachable or credentials rejected.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Malformed pipeline or filter. Indicates a programming defect.
    pub fn is_query(&self) -> bool {
        matches!(self, Error::InvalidQuery(_) | Error::InvalidPipeline(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod analytics;
pub mod clean;
pub mod config;
pub mod connection;
pub mod dashboard;
pub mod dataset;
pub mod error;
pub mod memory;
pub mod models;
#[cfg(feature = "mongo")]
pub mod mongo;
pub mod pipeline;
pub mod query;
pub mod shape;
pub mod store;
pub mod value;

pub use clean::{clean_year, clean_year_str};
pub use config::{MongoSettings, StoreConfig, TransportOptions};
pub use connection::{ConnectionProvider, StoreHandle};
pub use dashboard::DashboardData;
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use models::{
    CollectionCounts, GenreCount, MostCommentedMovie, TopRatedMovie, YearlyAverageRating,
};
#[cfg(feature = "mongo")]
pub use mongo::MongoStore;
pub use store::DocumentStore;

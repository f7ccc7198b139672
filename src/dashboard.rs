use serde::Serialize;
use tracing::info;

use crate::analytics::{self, TOP_LIMIT};
use crate::error::Result;
use crate::models::{
    CollectionCounts, GenreCount, MostCommentedMovie, TopRatedMovie, YearlyAverageRating,
};
use crate::store::DocumentStore;

/// Everything one render of the dashboard displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub counts: CollectionCounts,
    pub genres: Vec<GenreCount>,
    pub yearly_ratings: Vec<YearlyAverageRating>,
    pub top_rated: Vec<TopRatedMovie>,
    pub most_commented: Vec<MostCommentedMovie>,
}

impl DashboardData {
    /// Run one render cycle: the counts, then each pipeline in display order.
    /// The first failure aborts the cycle.
    pub fn collect(store: &dyn DocumentStore) -> Result<Self> {
        let counts = analytics::collection_counts(store)?;
        let genres = analytics::genre_distribution(store)?;
        let yearly_ratings = analytics::average_rating_by_year(store)?;
        let top_rated = analytics::top_rated_movies(store, TOP_LIMIT)?;
        let most_commented = analytics::most_commented_movies(store, TOP_LIMIT)?;

        info!(
            movies = counts.movies,
            comments = counts.comments,
            users = counts.users,
            genres = genres.len(),
            years = yearly_ratings.len(),
            "dashboard data collected"
        );

        Ok(Self {
            counts,
            genres,
            yearly_ratings,
            top_rated,
            most_commented,
        })
    }
}

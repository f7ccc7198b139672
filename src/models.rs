use serde::Serialize;

/// Movies per genre, one row per distinct genre.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreCount {
    pub genre: String,
    pub count: u64,
}

/// Mean IMDb rating for one cleaned release year.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyAverageRating {
    pub year: i32,
    pub avg_rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopRatedMovie {
    pub title: String,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MostCommentedMovie {
    pub title: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionCounts {
    pub movies: u64,
    pub comments: u64,
    pub users: u64,
}

//! The four dashboard pipelines and the collection counts.
//!
//! Each dataset is computed from scratch on every call; nothing here caches
//! results. Rows missing a field the output type requires (a title, a genre,
//! a count) are skipped and logged rather than failing the whole dataset.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::clean::clean_year;
use crate::error::Result;
use crate::models::{
    CollectionCounts, GenreCount, MostCommentedMovie, TopRatedMovie, YearlyAverageRating,
};
use crate::shape::Table;
use crate::store::{COMMENTS, DocumentStore, MOVIES, USERS};

/// Row cap for the two top-N lists.
pub const TOP_LIMIT: u64 = 20;

// ---------------------------------------------------------------------------
// Pipeline definitions
// ---------------------------------------------------------------------------

/// Ties on count are broken by genre name, ascending.
pub fn genre_distribution_pipeline() -> Value {
    json!([
        {"$unwind": "$genres"},
        {"$group": {"_id": "$genres", "count": {"$sum": 1}}},
        {"$sort": {"count": -1, "_id": 1}}
    ])
}

/// Grouped by the raw `year` value; `movieCount` lets rows whose raw years
/// clean to the same integer be merged without losing the mean.
pub fn average_rating_by_year_pipeline() -> Value {
    json!([
        {"$match": {"imdb.rating": {"$type": "number"}, "year": {"$ne": null}}},
        {"$group": {
            "_id": "$year",
            "avgRating": {"$avg": "$imdb.rating"},
            "movieCount": {"$sum": 1}
        }},
        {"$sort": {"_id": 1}}
    ])
}

/// Unrated movies are filtered before sorting, so the descending sort never
/// depends on where a store places nulls or non-numeric ratings.
pub fn top_rated_pipeline(limit: u64) -> Value {
    json!([
        {"$match": {"imdb.rating": {"$type": "number"}}},
        {"$project": {"title": 1, "rating": "$imdb.rating"}},
        {"$sort": {"rating": -1, "_id": 1}},
        {"$limit": limit}
    ])
}

/// The limit applies before the join, so groups whose `movie_id` matches no
/// movie use up a slot and the list can come back shorter than `limit`.
pub fn most_commented_pipeline(limit: u64) -> Value {
    json!([
        {"$group": {"_id": "$movie_id", "count": {"$sum": 1}}},
        {"$sort": {"count": -1, "_id": 1}},
        {"$limit": limit},
        {"$lookup": {
            "from": MOVIES,
            "localField": "_id",
            "foreignField": "_id",
            "as": "movie"
        }},
        {"$unwind": "$movie"},
        {"$project": {"title": "$movie.title", "count": 1}}
    ])
}

// ---------------------------------------------------------------------------
// Runners
// ---------------------------------------------------------------------------

pub fn collection_counts(store: &dyn DocumentStore) -> Result<CollectionCounts> {
    Ok(CollectionCounts {
        movies: store.count_documents(MOVIES)?,
        comments: store.count_documents(COMMENTS)?,
        users: store.count_documents(USERS)?,
    })
}

/// Movies per genre, descending by count.
pub fn genre_distribution(store: &dyn DocumentStore) -> Result<Vec<GenreCount>> {
    let rows = store.aggregate(MOVIES, &genre_distribution_pipeline())?;
    let table = Table::from_documents(rows)?.rename_column("_id", "Genre");

    let mut out = Vec::with_capacity(table.len());
    for row in table.rows() {
        match (row.str("Genre"), row.u64("count")) {
            (Some(genre), Some(count)) => out.push(GenreCount {
                genre: genre.to_string(),
                count,
            }),
            _ => warn!(genre = %row.get("Genre"), "skipping genre row without a name or count"),
        }
    }
    debug!(rows = out.len(), "genre distribution");
    Ok(out)
}

/// Mean rating per cleaned year, ascending, at most one row per year.
///
/// Raw group keys are run through [`clean_year`]; rejected years and groups
/// without a numeric mean are dropped. Raw keys that clean to the same year
/// (`1999` and `"1999è"`) are merged as a mean weighted by movie count.
pub fn average_rating_by_year(store: &dyn DocumentStore) -> Result<Vec<YearlyAverageRating>> {
    let rows = store.aggregate(MOVIES, &average_rating_by_year_pipeline())?;
    let table = Table::from_documents(rows)?.rename_column("_id", "Year");

    let mut by_year: BTreeMap<i32, Vec<(f64, u64)>> = BTreeMap::new();
    let mut rejected = 0usize;
    for row in table.rows() {
        let (Some(year), Some(avg)) = (clean_year(row.get("Year")), row.f64("avgRating")) else {
            rejected += 1;
            continue;
        };
        let weight = row.u64("movieCount").unwrap_or(1).max(1);
        by_year.entry(year).or_default().push((avg, weight));
    }

    let out: Vec<YearlyAverageRating> = by_year
        .into_iter()
        .map(|(year, parts)| YearlyAverageRating {
            year,
            avg_rating: merge_means(&parts),
        })
        .collect();
    debug!(rows = out.len(), rejected, "average rating by year");
    Ok(out)
}

fn merge_means(parts: &[(f64, u64)]) -> f64 {
    if let [(avg, _)] = parts {
        return *avg;
    }
    let total: u64 = parts.iter().map(|(_, w)| w).sum();
    let weighted: f64 = parts.iter().map(|(avg, w)| avg * *w as f64).sum();
    weighted / total as f64
}

/// Highest-rated movies, descending by rating.
pub fn top_rated_movies(store: &dyn DocumentStore, limit: u64) -> Result<Vec<TopRatedMovie>> {
    let rows = store.aggregate(MOVIES, &top_rated_pipeline(limit))?;
    let table = Table::from_documents(rows)?;

    let mut out = Vec::with_capacity(table.len());
    for row in table.rows() {
        let Some(title) = row.str("title") else {
            warn!(id = %row.get("_id"), "skipping top-rated row without a title");
            continue;
        };
        out.push(TopRatedMovie {
            title: title.to_string(),
            rating: row.f64("rating"),
        });
    }
    debug!(rows = out.len(), "top rated movies");
    Ok(out)
}

/// Movies with the most comments, descending by comment count.
pub fn most_commented_movies(
    store: &dyn DocumentStore,
    limit: u64,
) -> Result<Vec<MostCommentedMovie>> {
    let rows = store.aggregate(COMMENTS, &most_commented_pipeline(limit))?;
    let table = Table::from_documents(rows)?;

    let mut out = Vec::with_capacity(table.len());
    for row in table.rows() {
        match (row.str("title"), row.u64("count")) {
            (Some(title), Some(count)) => out.push(MostCommentedMovie {
                title: title.to_string(),
                count,
            }),
            _ => warn!(id = %row.get("_id"), "skipping commented movie without a title"),
        }
    }
    debug!(rows = out.len(), "most commented movies");
    Ok(out)
}

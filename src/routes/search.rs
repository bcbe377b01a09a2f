use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::SearchResult;
use crate::db::search;
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct SearchQuery {
    pub q: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/search", get(search_json))
}

/// GET /search?q=: users, categories and posts as a JSON array.
pub async fn search_json(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<SearchResult>>> {
    let conn = state.db.get()?;
    let results = search::search(&conn, &query.q)?;
    Ok(Json(results))
}

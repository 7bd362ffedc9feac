use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::services::{SearchCriteria, SearchParams};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct LiveSearchParams {
    pub q: Option<String>,
}

pub async fn search_events(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(params) = params?;
    let results = state.search.search(SearchCriteria::try_from(params)?).await?;
    Ok(success(results, "Search completed"))
}

pub async fn live_search(
    State(state): State<AppState>,
    params: Result<Query<LiveSearchParams>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(params) = params?;
    let results = state.search.live_search(params.q.as_deref()).await?;
    Ok(success(results, "Search completed"))
}

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use libcastdeck::types::HashtagStats;
use serde::Deserialize;

use super::LimitQuery;
use crate::error::Result;
use crate::AppState;

const DEFAULT_LIMIT: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct SuggestionRequest {
    pub content: String,
    pub limit: Option<u32>,
}

pub async fn suggestions(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SuggestionRequest>, JsonRejection>,
) -> Result<Json<Vec<HashtagStats>>> {
    let Json(request) = payload?;
    let tags = state
        .service
        .hashtags()
        .suggestions(&request.content, request.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(tags))
}

pub async fn trending(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<Vec<HashtagStats>>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    Ok(Json(state.service.hashtags().trending(limit).await?))
}

pub async fn performance(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> Result<Json<HashtagStats>> {
    Ok(Json(state.service.hashtags().performance(&tag).await?))
}

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use libcastdeck::service::engagement::{MetricsUpdate, DEFAULT_RECENT_LIMIT};
use libcastdeck::types::{EngagementSummary, PostPerformance};
use libcastdeck::EngagementRecord;

use super::LimitQuery;
use crate::error::Result;
use crate::AppState;

const DEFAULT_TOP_LIMIT: u32 = 10;

pub async fn record_metrics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<MetricsUpdate>, JsonRejection>,
) -> Result<Json<EngagementRecord>> {
    let Json(update) = payload?;
    Ok(Json(state.service.engagement().record_metrics(&id, update).await?))
}

pub async fn get_engagement(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EngagementRecord>> {
    Ok(Json(state.service.engagement().get(&id).await?))
}

pub async fn account_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EngagementSummary>> {
    Ok(Json(state.service.engagement().summary(&id).await?))
}

pub async fn recent_engagement(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    query: std::result::Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<Vec<EngagementRecord>>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    Ok(Json(state.service.engagement().recent(&id, limit).await?))
}

pub async fn top_posts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    query: std::result::Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<Vec<PostPerformance>>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    Ok(Json(state.service.engagement().top_posts(&id, limit).await?))
}

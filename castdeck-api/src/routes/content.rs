use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use chrono::{DateTime, Utc};
use libcastdeck::service::scheduler::ScheduleRequest;
use libcastdeck::{CastdeckError, ScheduledPost};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub post_id: String,
    pub cancelled: bool,
}

pub async fn schedule_post(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ScheduleRequest>, JsonRejection>,
) -> Result<Json<ScheduledPost>> {
    let Json(request) = payload?;
    let post = state.service.scheduler().schedule(request).await?;
    Ok(Json(post))
}

/// `id` is an account id here
pub async fn list_account_posts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    query: std::result::Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<Vec<ScheduledPost>>> {
    let Query(range) = query?;
    let posts = state
        .service
        .scheduler()
        .list(&id, range.start_time, range.end_time)
        .await?;
    Ok(Json(posts))
}

/// `id` is a post id here
pub async fn cancel_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>> {
    if !state.service.scheduler().cancel(&id).await? {
        return Err(CastdeckError::NotFound(format!(
            "Post {} not found or no longer cancellable",
            id
        ))
        .into());
    }

    Ok(Json(CancelResponse {
        post_id: id,
        cancelled: true,
    }))
}

pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ScheduledPost>> {
    Ok(Json(state.service.scheduler().get(&id).await?))
}

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use libcastdeck::service::notifications::DEFAULT_NOTIFICATION_LIMIT;
use libcastdeck::Notification;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MarkedResponse {
    pub marked: u64,
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Notification>>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_NOTIFICATION_LIMIT);
    Ok(Json(
        state
            .service
            .notifications()
            .list(query.unread_only, limit)
            .await?,
    ))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MarkedResponse>> {
    state.service.notifications().mark_read(&id).await?;
    Ok(Json(MarkedResponse { marked: 1 }))
}

pub async fn mark_all_read(State(state): State<Arc<AppState>>) -> Result<Json<MarkedResponse>> {
    let marked = state.service.notifications().mark_all_read().await?;
    Ok(Json(MarkedResponse { marked }))
}

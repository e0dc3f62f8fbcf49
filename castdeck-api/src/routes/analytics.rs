use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use libcastdeck::service::analytics::{
    AccountAnalytics, AnalyticsReport, PostAnalytics, DEFAULT_REPORT_PERIOD,
};
use serde::Deserialize;

use crate::error::Result;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    /// Trailing window such as `30d` or `4w`
    pub period: Option<String>,
}

pub async fn account_analytics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AccountAnalytics>> {
    Ok(Json(state.service.analytics().account(&id).await?))
}

pub async fn post_analytics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PostAnalytics>> {
    Ok(Json(state.service.analytics().post(&id).await?))
}

pub async fn account_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    query: std::result::Result<Query<ReportQuery>, QueryRejection>,
) -> Result<Json<AnalyticsReport>> {
    let Query(query) = query?;
    let period = query.period.as_deref().unwrap_or(DEFAULT_REPORT_PERIOD);
    Ok(Json(state.service.analytics().report(&id, period).await?))
}

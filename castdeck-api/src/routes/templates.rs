use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use libcastdeck::{CastdeckError, ContentTemplate};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub content: String,
    /// Default values for placeholders
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyTemplateRequest {
    pub template_id: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct AppliedTemplate {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub template_id: String,
    pub deleted: bool,
}

pub async fn create_template(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CreateTemplateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ContentTemplate>)> {
    let Json(request) = payload?;
    let template = state
        .service
        .templates()
        .create(&request.name, &request.content, request.variables)
        .await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn list_templates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ContentTemplate>>> {
    Ok(Json(state.service.templates().list().await?))
}

pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ContentTemplate>> {
    Ok(Json(state.service.templates().get(&id).await?))
}

pub async fn apply_template(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ApplyTemplateRequest>, JsonRejection>,
) -> Result<Json<AppliedTemplate>> {
    let Json(request) = payload?;
    let content = state
        .service
        .templates()
        .apply(&request.template_id, &request.variables)
        .await?;
    Ok(Json(AppliedTemplate { content }))
}

pub async fn delete_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.service.templates().delete(&id).await? {
        return Err(CastdeckError::NotFound(format!("Template not found: {}", id)).into());
    }

    Ok(Json(DeleteResponse {
        template_id: id,
        deleted: true,
    }))
}

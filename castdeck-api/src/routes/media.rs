use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    Json,
};
use libcastdeck::{CastdeckError, MediaFile};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub media_id: String,
    pub deleted: bool,
}

/// `POST /media?filename=...` with the raw file as the body
///
/// The `Content-Type` header names the file's type.
pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<UploadQuery>, QueryRejection>,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<MediaFile>)> {
    let Query(query) = query?;
    let body = body?;
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream");

    let media = state
        .service
        .media()
        .upload(&query.filename, mime_type, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(media)))
}

pub async fn list_media(State(state): State<Arc<AppState>>) -> Result<Json<Vec<MediaFile>>> {
    Ok(Json(state.service.media().list().await?))
}

pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MediaFile>> {
    Ok(Json(state.service.media().get(&id).await?))
}

pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.service.media().delete(&id).await? {
        return Err(CastdeckError::NotFound(format!("Media file not found: {}", id)).into());
    }

    Ok(Json(DeleteResponse {
        media_id: id,
        deleted: true,
    }))
}

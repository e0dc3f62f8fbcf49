use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use libcastdeck::Account;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub platform: String,
    /// Platform specific keys, e.g. `access_token`
    #[serde(default)]
    pub auth_data: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub account_id: String,
    pub disconnected: bool,
}

pub async fn connect_account(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ConnectRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>)> {
    let Json(request) = payload?;
    let account = state
        .service
        .accounts()
        .connect(&request.platform, &request.auth_data)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn list_accounts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Account>>> {
    Ok(Json(state.service.accounts().list().await?))
}

pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Account>> {
    Ok(Json(state.service.accounts().get(&id).await?))
}

/// Removes the account with its posts and engagement data
pub async fn disconnect_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DisconnectResponse>> {
    state.service.accounts().disconnect(&id).await?;
    Ok(Json(DisconnectResponse {
        account_id: id,
        disconnected: true,
    }))
}

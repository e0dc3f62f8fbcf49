//! JSON-over-HTTPS plumbing shared by the platform adapters
//!
//! Every adapter talks to a REST API with a bearer token. Transport failures
//! and non-success statuses are mapped onto [`PublishError`] here so the
//! dispatcher sees the same retry classification for every platform.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use super::PublishResult;
use crate::error::PublishError;

/// Longest error body kept in a message
const MAX_ERROR_BODY: usize = 200;

pub(crate) struct ApiClient {
    client: reqwest::Client,
    base: String,
    platform: &'static str,
}

impl ApiClient {
    pub(crate) fn new(platform: &'static str, base: &str) -> Self {
        // Builder only fails when the TLS backend cannot initialize
        let client = reqwest::Client::builder()
            .user_agent(concat!("castdeck/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            platform,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        query: &[(&str, &str)],
    ) -> PublishResult<T> {
        let request = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .query(query);
        self.send(request).await
    }

    pub(crate) async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> PublishResult<T> {
        let request = self.client.post(self.url(path)).bearer_auth(token).json(body);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> PublishResult<T> {
        let resp = request
            .send()
            .await
            .map_err(|e| transport_error(self.platform, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(platform = self.platform, status = status.as_u16(), "API call failed");
            return Err(error_for_status(self.platform, status, &body));
        }

        resp.json::<T>().await.map_err(|e| {
            PublishError::Rejected(format!("{} returned an unexpected response: {}", self.platform, e))
        })
    }
}

/// Classify a non-success HTTP status
pub(crate) fn error_for_status(platform: &str, status: StatusCode, body: &str) -> PublishError {
    let detail = summarize_body(body);
    let message = if detail.is_empty() {
        format!("{} returned {}", platform, status)
    } else {
        format!("{} returned {}: {}", platform, status, detail)
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => PublishError::RateLimit(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PublishError::Authentication(message),
        s if s.is_server_error() => PublishError::Network(message),
        _ => PublishError::Rejected(message),
    }
}

fn transport_error(platform: &str, err: reqwest::Error) -> PublishError {
    if err.is_timeout() {
        PublishError::Timeout(format!("{} did not answer in time: {}", platform, err))
    } else {
        PublishError::Network(format!("{} unreachable: {}", platform, err))
    }
}

fn summarize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
    format!("{}...", cut)
}

/// Fetch a required credential from `connect` auth data
pub(crate) fn required<'a>(
    platform: &str,
    auth: &'a HashMap<String, String>,
    key: &str,
) -> PublishResult<&'a str> {
    match auth.get(key).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(PublishError::Authentication(format!(
            "{} requires '{}' to connect",
            platform, key
        ))),
    }
}

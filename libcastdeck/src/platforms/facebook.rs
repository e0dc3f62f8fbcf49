//! Facebook Pages publisher (Graph API)

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use super::http::{required, ApiClient};
use super::{PublishResult, Publisher};
use crate::types::{AccountHandle, PostMetrics};

pub const NAME: &str = "facebook";
pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v19.0";

pub struct FacebookPublisher {
    api: ApiClient,
}

#[derive(Deserialize)]
struct Page {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct Created {
    id: String,
    /// Photo uploads return the feed post separately
    #[serde(default)]
    post_id: Option<String>,
}

#[derive(Deserialize, Default)]
struct Summary {
    #[serde(default)]
    total_count: i64,
}

#[derive(Deserialize, Default)]
struct Edge {
    #[serde(default)]
    summary: Summary,
}

#[derive(Deserialize, Default)]
struct Shares {
    #[serde(default)]
    count: i64,
}

#[derive(Deserialize)]
struct PostCounts {
    #[serde(default)]
    reactions: Edge,
    #[serde(default)]
    comments: Edge,
    #[serde(default)]
    shares: Shares,
}

impl FacebookPublisher {
    pub fn new(api_base: Option<&str>) -> Self {
        Self {
            api: ApiClient::new(NAME, api_base.unwrap_or(DEFAULT_API_BASE)),
        }
    }
}

#[async_trait]
impl Publisher for FacebookPublisher {
    fn name(&self) -> &str {
        NAME
    }

    fn character_limit(&self) -> Option<usize> {
        Some(63206)
    }

    fn max_media(&self) -> usize {
        1
    }

    /// Expects a page access token
    async fn connect(&self, auth: &HashMap<String, String>) -> PublishResult<AccountHandle> {
        let token = required(NAME, auth, "access_token")?;
        let page: Page = self
            .api
            .get_json("/me", token, &[("fields", "id,name")])
            .await?;

        tracing::info!("Connected Facebook page {}", page.name);

        Ok(AccountHandle {
            platform_user_id: page.id,
            username: page.name,
            access_token: token.to_string(),
            refresh_token: None,
        })
    }

    async fn publish(
        &self,
        handle: &AccountHandle,
        content: &str,
        media: &[String],
    ) -> PublishResult<String> {
        let (path, body) = match media.first() {
            Some(url) => (
                format!("/{}/photos", handle.platform_user_id),
                json!({"url": url, "caption": content}),
            ),
            None => (
                format!("/{}/feed", handle.platform_user_id),
                json!({"message": content}),
            ),
        };

        let created: Created = self.api.post_json(&path, &handle.access_token, &body).await?;
        Ok(created.post_id.unwrap_or(created.id))
    }

    async fn insights(
        &self,
        handle: &AccountHandle,
        platform_post_id: &str,
    ) -> PublishResult<PostMetrics> {
        let path = format!("/{}", platform_post_id);
        let counts: PostCounts = self
            .api
            .get_json(
                &path,
                &handle.access_token,
                &[(
                    "fields",
                    "reactions.summary(total_count),comments.summary(total_count),shares",
                )],
            )
            .await?;

        Ok(PostMetrics {
            likes: counts.reactions.summary.total_count,
            comments: counts.comments.summary.total_count,
            shares: counts.shares.count,
            sentiment: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::http::test_server::serve;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    fn handle() -> AccountHandle {
        AccountHandle {
            platform_user_id: "page-1".to_string(),
            username: "Castdeck".to_string(),
            access_token: "token".to_string(),
            refresh_token: None,
        }
    }

    fn fake_api() -> Router {
        Router::new()
            .route("/{id}/feed", post(|| async { Json(json!({"id": "page-1_100"})) }))
            .route(
                "/{id}/photos",
                post(|| async { Json(json!({"id": "photo-7", "post_id": "page-1_200"})) }),
            )
            .route(
                "/{id}",
                get(|| async {
                    // Posts without shares omit the field entirely
                    Json(json!({
                        "reactions": {"data": [], "summary": {"total_count": 9}},
                        "comments": {"data": [], "summary": {"total_count": 2}}
                    }))
                }),
            )
    }

    #[tokio::test]
    async fn test_text_and_photo_posts() {
        let base = serve(fake_api()).await;
        let publisher = FacebookPublisher::new(Some(&base));

        let id = publisher.publish(&handle(), "hello page", &[]).await.unwrap();
        assert_eq!(id, "page-1_100");

        let id = publisher
            .publish(&handle(), "look", &["https://cdn/x.png".to_string()])
            .await
            .unwrap();
        assert_eq!(id, "page-1_200");
    }

    #[tokio::test]
    async fn test_insights_missing_shares_is_zero() {
        let base = serve(fake_api()).await;
        let publisher = FacebookPublisher::new(Some(&base));

        let metrics = publisher.insights(&handle(), "page-1_100").await.unwrap();
        assert_eq!(metrics.likes, 9);
        assert_eq!(metrics.comments, 2);
        assert_eq!(metrics.shares, 0);
    }

    #[test]
    fn test_single_media_only() {
        let publisher = FacebookPublisher::new(None);
        let two = vec!["a.png".to_string(), "b.png".to_string()];
        assert!(publisher.validate("x", &two).is_err());
    }
}

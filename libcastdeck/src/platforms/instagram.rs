//! Instagram Graph API publisher
//!
//! Instagram publishes in two steps: create a media container, then publish
//! it. Several media references become a carousel of child containers.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use super::http::{required, ApiClient};
use super::{PublishResult, Publisher};
use crate::types::{AccountHandle, PostMetrics};

pub const NAME: &str = "instagram";
pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v19.0";

pub struct InstagramPublisher {
    api: ApiClient,
}

#[derive(Deserialize)]
struct Profile {
    id: String,
    username: String,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct MediaCounts {
    #[serde(default)]
    like_count: i64,
    #[serde(default)]
    comments_count: i64,
}

impl InstagramPublisher {
    pub fn new(api_base: Option<&str>) -> Self {
        Self {
            api: ApiClient::new(NAME, api_base.unwrap_or(DEFAULT_API_BASE)),
        }
    }

    async fn create_container(
        &self,
        handle: &AccountHandle,
        body: serde_json::Value,
    ) -> PublishResult<String> {
        let path = format!("/{}/media", handle.platform_user_id);
        let created: Created = self.api.post_json(&path, &handle.access_token, &body).await?;
        Ok(created.id)
    }
}

#[async_trait]
impl Publisher for InstagramPublisher {
    fn name(&self) -> &str {
        NAME
    }

    fn character_limit(&self) -> Option<usize> {
        Some(2200)
    }

    fn requires_media(&self) -> bool {
        true
    }

    fn max_media(&self) -> usize {
        10
    }

    async fn connect(&self, auth: &HashMap<String, String>) -> PublishResult<AccountHandle> {
        let token = required(NAME, auth, "access_token")?;
        let profile: Profile = self
            .api
            .get_json("/me", token, &[("fields", "id,username")])
            .await?;

        tracing::info!("Connected Instagram account {}", profile.username);

        Ok(AccountHandle {
            platform_user_id: profile.id,
            username: profile.username,
            access_token: token.to_string(),
            refresh_token: None,
        })
    }

    /// Media references are public image URLs
    async fn publish(
        &self,
        handle: &AccountHandle,
        content: &str,
        media: &[String],
    ) -> PublishResult<String> {
        let container = match media {
            [single] => {
                self.create_container(handle, json!({"image_url": single, "caption": content}))
                    .await?
            }
            many => {
                let mut children = Vec::with_capacity(many.len());
                for url in many {
                    let child = self
                        .create_container(
                            handle,
                            json!({"image_url": url, "is_carousel_item": true}),
                        )
                        .await?;
                    children.push(child);
                }
                self.create_container(
                    handle,
                    json!({
                        "media_type": "CAROUSEL",
                        "children": children.join(","),
                        "caption": content,
                    }),
                )
                .await?
            }
        };

        let path = format!("/{}/media_publish", handle.platform_user_id);
        let published: Created = self
            .api
            .post_json(&path, &handle.access_token, &json!({"creation_id": container}))
            .await?;
        Ok(published.id)
    }

    async fn insights(
        &self,
        handle: &AccountHandle,
        platform_post_id: &str,
    ) -> PublishResult<PostMetrics> {
        let path = format!("/{}", platform_post_id);
        let counts: MediaCounts = self
            .api
            .get_json(
                &path,
                &handle.access_token,
                &[("fields", "like_count,comments_count")],
            )
            .await?;

        // The Graph API does not expose share counts for feed media
        Ok(PostMetrics {
            likes: counts.like_count,
            comments: counts.comments_count,
            shares: 0,
            sentiment: None,
        })
    }
}

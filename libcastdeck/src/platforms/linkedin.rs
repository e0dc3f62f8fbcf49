//! LinkedIn publisher (UGC posts API)

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use super::http::{required, ApiClient};
use super::{PublishResult, Publisher};
use crate::types::{AccountHandle, PostMetrics};

pub const NAME: &str = "linkedin";
pub const DEFAULT_API_BASE: &str = "https://api.linkedin.com";

pub struct LinkedInPublisher {
    api: ApiClient,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    name: String,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LikesSummary {
    #[serde(default)]
    total_likes: i64,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CommentsSummary {
    #[serde(default)]
    aggregated_total_comments: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocialActions {
    #[serde(default)]
    likes_summary: LikesSummary,
    #[serde(default)]
    comments_summary: CommentsSummary,
}

impl LinkedInPublisher {
    pub fn new(api_base: Option<&str>) -> Self {
        Self {
            api: ApiClient::new(NAME, api_base.unwrap_or(DEFAULT_API_BASE)),
        }
    }
}

#[async_trait]
impl Publisher for LinkedInPublisher {
    fn name(&self) -> &str {
        NAME
    }

    fn character_limit(&self) -> Option<usize> {
        Some(3000)
    }

    /// Media references are shared as article links
    fn max_media(&self) -> usize {
        1
    }

    async fn connect(&self, auth: &HashMap<String, String>) -> PublishResult<AccountHandle> {
        let token = required(NAME, auth, "access_token")?;
        let info: UserInfo = self.api.get_json("/v2/userinfo", token, &[]).await?;

        tracing::info!("Connected LinkedIn member {}", info.name);

        Ok(AccountHandle {
            platform_user_id: info.sub,
            username: info.name,
            access_token: token.to_string(),
            refresh_token: auth.get("refresh_token").cloned(),
        })
    }

    async fn publish(
        &self,
        handle: &AccountHandle,
        content: &str,
        media: &[String],
    ) -> PublishResult<String> {
        let share = match media.first() {
            Some(url) => json!({
                "shareCommentary": {"text": content},
                "shareMediaCategory": "ARTICLE",
                "media": [{"status": "READY", "originalUrl": url}],
            }),
            None => json!({
                "shareCommentary": {"text": content},
                "shareMediaCategory": "NONE",
            }),
        };

        let body = json!({
            "author": format!("urn:li:person:{}", handle.platform_user_id),
            "lifecycleState": "PUBLISHED",
            "specificContent": {"com.linkedin.ugc.ShareContent": share},
            "visibility": {"com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"},
        });

        let created: Created = self
            .api
            .post_json("/v2/ugcPosts", &handle.access_token, &body)
            .await?;
        Ok(created.id)
    }

    async fn insights(
        &self,
        handle: &AccountHandle,
        platform_post_id: &str,
    ) -> PublishResult<PostMetrics> {
        let path = format!("/v2/socialActions/{}", platform_post_id);
        let actions: SocialActions = self.api.get_json(&path, &handle.access_token, &[]).await?;

        Ok(PostMetrics {
            likes: actions.likes_summary.total_likes,
            comments: actions.comments_summary.aggregated_total_comments,
            shares: 0,
            sentiment: None,
        })
    }
}

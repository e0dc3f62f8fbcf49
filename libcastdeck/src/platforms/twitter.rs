//! Twitter (X) API v2 publisher

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::http::{required, ApiClient};
use super::{PublishResult, Publisher};
use crate::types::{AccountHandle, PostMetrics};

pub const NAME: &str = "twitter";
pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";

pub struct TwitterPublisher {
    api: ApiClient,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct User {
    id: String,
    username: String,
}

#[derive(Serialize)]
struct NewTweet<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<TweetMedia<'a>>,
}

#[derive(Serialize)]
struct TweetMedia<'a> {
    media_ids: &'a [String],
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct TweetWithMetrics {
    public_metrics: PublicMetrics,
}

#[derive(Deserialize)]
struct PublicMetrics {
    like_count: i64,
    reply_count: i64,
    retweet_count: i64,
    #[serde(default)]
    quote_count: i64,
}

impl TwitterPublisher {
    /// `api_base` overrides the public endpoint (sandbox or test server)
    pub fn new(api_base: Option<&str>) -> Self {
        Self {
            api: ApiClient::new(NAME, api_base.unwrap_or(DEFAULT_API_BASE)),
        }
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    fn name(&self) -> &str {
        NAME
    }

    fn character_limit(&self) -> Option<usize> {
        Some(280)
    }

    async fn connect(&self, auth: &HashMap<String, String>) -> PublishResult<AccountHandle> {
        let token = required(NAME, auth, "access_token")?;
        let me: Envelope<User> = self.api.get_json("/2/users/me", token, &[]).await?;

        tracing::info!("Connected Twitter account @{}", me.data.username);

        Ok(AccountHandle {
            platform_user_id: me.data.id,
            username: me.data.username,
            access_token: token.to_string(),
            refresh_token: auth.get("refresh_token").cloned(),
        })
    }

    /// Media references are ids returned by the media upload endpoint
    async fn publish(
        &self,
        handle: &AccountHandle,
        content: &str,
        media: &[String],
    ) -> PublishResult<String> {
        let body = NewTweet {
            text: content,
            media: (!media.is_empty()).then_some(TweetMedia { media_ids: media }),
        };

        let created: Envelope<Created> = self
            .api
            .post_json("/2/tweets", &handle.access_token, &body)
            .await?;
        Ok(created.data.id)
    }

    async fn insights(
        &self,
        handle: &AccountHandle,
        platform_post_id: &str,
    ) -> PublishResult<PostMetrics> {
        let path = format!("/2/tweets/{}", platform_post_id);
        let tweet: Envelope<TweetWithMetrics> = self
            .api
            .get_json(&path, &handle.access_token, &[("tweet.fields", "public_metrics")])
            .await?;

        let m = tweet.data.public_metrics;
        Ok(PostMetrics {
            likes: m.like_count,
            comments: m.reply_count,
            // Quotes are reshares with commentary
            shares: m.retweet_count + m.quote_count,
            sentiment: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use crate::platforms::http::test_server::serve;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn handle() -> AccountHandle {
        AccountHandle {
            platform_user_id: "42".to_string(),
            username: "castdeck".to_string(),
            access_token: "good-token".to_string(),
            refresh_token: None,
        }
    }

    fn fake_api() -> Router {
        Router::new()
            .route(
                "/2/users/me",
                get(|headers: HeaderMap| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    if auth != "Bearer good-token" {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    Ok(Json(json!({"data": {"id": "42", "username": "castdeck"}})))
                }),
            )
            .route(
                "/2/tweets",
                post(|Json(body): Json<Value>| async move {
                    if body["text"] == "boom" {
                        return Err(StatusCode::SERVICE_UNAVAILABLE);
                    }
                    if body["text"] == "dupe" {
                        return Err(StatusCode::FORBIDDEN);
                    }
                    let id = if body.get("media").is_some() { "1002" } else { "1001" };
                    Ok(Json(json!({"data": {"id": id, "text": body["text"]}})))
                }),
            )
            .route(
                "/2/tweets/{id}",
                get(|Path(id): Path<String>| async move {
                    Json(json!({
                        "data": {
                            "id": id,
                            "public_metrics": {
                                "like_count": 10,
                                "reply_count": 3,
                                "retweet_count": 2,
                                "quote_count": 1
                            }
                        }
                    }))
                }),
            )
    }

    #[test]
    fn test_limits() {
        let publisher = TwitterPublisher::new(None);
        assert_eq!(publisher.name(), "twitter");
        assert!(publisher.validate(&"a".repeat(280), &[]).is_ok());
        assert!(publisher.validate(&"a".repeat(281), &[]).is_err());
    }

    #[tokio::test]
    async fn test_connect_resolves_user() {
        let base = serve(fake_api()).await;
        let publisher = TwitterPublisher::new(Some(&base));

        let mut auth = HashMap::new();
        auth.insert("access_token".to_string(), "good-token".to_string());
        let handle = publisher.connect(&auth).await.unwrap();
        assert_eq!(handle.platform_user_id, "42");
        assert_eq!(handle.username, "castdeck");

        auth.insert("access_token".to_string(), "bad-token".to_string());
        let err = publisher.connect(&auth).await.unwrap_err();
        assert!(matches!(err, PublishError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_connect_requires_token() {
        let publisher = TwitterPublisher::new(Some("http://127.0.0.1:9"));
        let err = publisher.connect(&HashMap::new()).await.unwrap_err();
        assert!(err.to_string().contains("access_token"));
    }

    #[tokio::test]
    async fn test_publish_and_insights() {
        let base = serve(fake_api()).await;
        let publisher = TwitterPublisher::new(Some(&base));

        let id = publisher.publish(&handle(), "hello", &[]).await.unwrap();
        assert_eq!(id, "1001");
        let id = publisher
            .publish(&handle(), "with media", &["m-1".to_string()])
            .await
            .unwrap();
        assert_eq!(id, "1002");

        let metrics = publisher.insights(&handle(), "1001").await.unwrap();
        assert_eq!(metrics.likes, 10);
        assert_eq!(metrics.comments, 3);
        assert_eq!(metrics.shares, 3);
        assert_eq!(metrics.sentiment, None);
    }

    #[tokio::test]
    async fn test_publish_error_classification() {
        let base = serve(fake_api()).await;
        let publisher = TwitterPublisher::new(Some(&base));

        let err = publisher.publish(&handle(), "boom", &[]).await.unwrap_err();
        assert!(err.is_retryable(), "5xx should be retryable: {:?}", err);

        let err = publisher.publish(&handle(), "dupe", &[]).await.unwrap_err();
        assert!(matches!(err, PublishError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_unreachable_platform_is_network_error() {
        // Nothing listens on the discard port
        let publisher = TwitterPublisher::new(Some("http://127.0.0.1:9"));
        let err = publisher.publish(&handle(), "hi", &[]).await.unwrap_err();
        assert!(err.is_retryable());
    }
}

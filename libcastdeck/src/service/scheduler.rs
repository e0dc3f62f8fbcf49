//! Content scheduling
//!
//! Validates and stores posts for later dispatch, lists them per account and
//! cancels them while they are still pending.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::events::{Event, EventBus};
use super::hashtags::HashtagService;
use crate::error::{CastdeckError, PublishError};
use crate::platforms::PublisherRegistry;
use crate::types::{now_secs, PostStatus, ScheduledPost};
use crate::{Database, Result};

/// Posts without an explicit time go out this far in the future
pub const DEFAULT_SCHEDULE_DELAY_SECS: i64 = 3600;

/// Request to schedule a post
///
/// Unknown fields are rejected rather than dropped. `media_urls` is accepted
/// as another name for `media_refs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleRequest {
    pub account_id: String,
    pub content: String,
    #[serde(default, alias = "media_urls")]
    pub media_refs: Vec<String>,
    /// Defaults to one hour from now
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct SchedulerService {
    db: Arc<Database>,
    registry: Arc<PublisherRegistry>,
    hashtags: HashtagService,
    event_bus: EventBus,
    claim_ttl: Duration,
}

impl SchedulerService {
    pub fn new(
        db: Arc<Database>,
        registry: Arc<PublisherRegistry>,
        event_bus: EventBus,
        claim_ttl: Duration,
    ) -> Self {
        Self {
            hashtags: HashtagService::new(Arc::clone(&db)),
            db,
            registry,
            event_bus,
            claim_ttl,
        }
    }

    /// Validate and store a post with status `scheduled`
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the content is blank or breaks the limits of
    ///   the account's platform
    /// - `NotFound` if the account does not exist
    pub async fn schedule(&self, request: ScheduleRequest) -> Result<ScheduledPost> {
        if request.content.trim().is_empty() {
            return Err(CastdeckError::InvalidArgument(
                "content must not be empty".to_string(),
            ));
        }

        let account = self
            .db
            .get_account(&request.account_id)
            .await?
            .ok_or_else(|| CastdeckError::not_found("Account", &request.account_id))?;

        if let Some(publisher) = self.registry.get(&account.platform) {
            publisher
                .validate(&request.content, &request.media_refs)
                .map_err(|e| match e {
                    PublishError::Validation(msg) => CastdeckError::InvalidArgument(msg),
                    other => CastdeckError::Publish(other),
                })?;
        } else {
            tracing::debug!(
                "No publisher registered for '{}', skipping platform validation",
                account.platform
            );
        }

        let scheduled_at = request
            .scheduled_time
            .unwrap_or_else(|| Utc::now() + Duration::seconds(DEFAULT_SCHEDULE_DELAY_SECS));

        let post = ScheduledPost::new(
            account.id,
            request.content,
            request.media_refs,
            scheduled_at,
        );
        self.db.insert_post(&post).await?;

        // Indexing is best effort; the post is already stored
        if let Err(e) = self.hashtags.index_post(&post).await {
            tracing::warn!("Failed to index hashtags for post {}: {}", post.id, e);
        }

        tracing::info!(
            post_id = %post.id,
            account_id = %post.account_id,
            scheduled_at = %post.scheduled_at,
            "Post scheduled"
        );

        self.event_bus.emit(Event::PostScheduled {
            post_id: post.id.clone(),
            account_id: post.account_id.clone(),
            scheduled_at: post.scheduled_at,
        });

        Ok(post)
    }

    pub async fn get(&self, post_id: &str) -> Result<ScheduledPost> {
        self.db
            .get_post(post_id)
            .await?
            .ok_or_else(|| CastdeckError::not_found("Post", post_id))
    }

    /// Posts of an account in ascending scheduled order
    ///
    /// Bounds are inclusive; a missing bound does not filter. Cancelled and
    /// terminal posts are included with their status.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub async fn list(
        &self,
        account_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScheduledPost>> {
        if !self.db.account_exists(account_id).await? {
            return Err(CastdeckError::not_found("Account", account_id));
        }
        self.db.list_posts_for_account(account_id, start, end).await
    }

    /// Posts across accounts, optionally filtered
    pub async fn list_all(
        &self,
        status: Option<PostStatus>,
        account_id: Option<&str>,
    ) -> Result<Vec<ScheduledPost>> {
        self.db.list_posts(status, account_id).await
    }

    /// Cancel a pending post
    ///
    /// Returns false when the post does not exist, is no longer `scheduled`,
    /// or is being published right now.
    pub async fn cancel(&self, post_id: &str) -> Result<bool> {
        let now = now_secs();
        let cancelled = self
            .db
            .cancel_post(post_id, now, now - self.claim_ttl)
            .await?;

        if cancelled {
            tracing::info!(post_id, "Post cancelled");
            self.event_bus.emit(Event::PostCancelled {
                post_id: post_id.to_string(),
            });
        } else {
            tracing::debug!(post_id, "Post not cancellable");
        }

        Ok(cancelled)
    }

    /// Number of posts in each status
    pub async fn stats(&self) -> Result<HashMap<PostStatus, i64>> {
        self.db.count_posts_by_status(None).await
    }
}

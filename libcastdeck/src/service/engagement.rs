//! Engagement tracking and account roll-ups

use std::sync::Arc;

use super::events::{Event, EventBus};
use crate::error::CastdeckError;
use crate::types::{
    now_secs, EngagementRecord, EngagementSummary, PostPerformance, PostStatus,
};
use crate::{Database, Result};

pub const DEFAULT_RECENT_LIMIT: u32 = 100;
pub const MAX_RECENT_LIMIT: u32 = 500;

/// Counters supplied by a caller for one post
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct MetricsUpdate {
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub sentiment: f64,
}

#[derive(Clone)]
pub struct EngagementService {
    db: Arc<Database>,
    event_bus: EventBus,
}

impl EngagementService {
    pub fn new(db: Arc<Database>, event_bus: EventBus) -> Self {
        Self { db, event_bus }
    }

    /// Store counters for a published post
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for negative counters or sentiment outside
    ///   [-1, 1]
    /// - `NotFound` if the post does not exist or is not published
    pub async fn record_metrics(
        &self,
        post_id: &str,
        update: MetricsUpdate,
    ) -> Result<EngagementRecord> {
        for (field, value) in [
            ("likes", update.likes),
            ("comments", update.comments),
            ("shares", update.shares),
        ] {
            if value < 0 {
                return Err(CastdeckError::InvalidArgument(format!(
                    "{} must not be negative (got {})",
                    field, value
                )));
            }
        }
        if !(-1.0..=1.0).contains(&update.sentiment) {
            return Err(CastdeckError::InvalidArgument(format!(
                "sentiment must be between -1 and 1 (got {})",
                update.sentiment
            )));
        }

        match self.db.get_post(post_id).await? {
            Some(post) if post.status == PostStatus::Published => {}
            _ => return Err(CastdeckError::not_found("Published post", post_id)),
        }

        let record = self
            .db
            .upsert_engagement(
                post_id,
                update.likes,
                update.comments,
                update.shares,
                Some(update.sentiment),
                now_secs(),
            )
            .await?;

        self.emit_updated(&record);
        Ok(record)
    }

    pub async fn get(&self, post_id: &str) -> Result<EngagementRecord> {
        self.db
            .get_engagement(post_id)
            .await?
            .ok_or_else(|| CastdeckError::not_found("Engagement record", post_id))
    }

    /// Totals for an account; zeros when it has no records
    pub async fn summary(&self, account_id: &str) -> Result<EngagementSummary> {
        self.ensure_account(account_id).await?;
        self.db.engagement_summary(account_id).await
    }

    /// Most recently updated records first; `limit` is clamped to 1..=500
    pub async fn recent(&self, account_id: &str, limit: u32) -> Result<Vec<EngagementRecord>> {
        self.ensure_account(account_id).await?;
        self.db
            .recent_engagements(account_id, limit.clamp(1, MAX_RECENT_LIMIT))
            .await
    }

    /// Posts ranked by likes + comments + shares
    pub async fn top_posts(&self, account_id: &str, limit: u32) -> Result<Vec<PostPerformance>> {
        self.ensure_account(account_id).await?;
        self.db
            .top_posts(account_id, limit.clamp(1, MAX_RECENT_LIMIT))
            .await
    }

    fn emit_updated(&self, record: &EngagementRecord) {
        self.event_bus.emit(Event::MetricsUpdated {
            post_id: record.post_id.clone(),
            likes: record.likes,
            comments: record.comments,
            shares: record.shares,
            sentiment: record.sentiment,
        });
    }

    async fn ensure_account(&self, account_id: &str) -> Result<()> {
        if self.db.account_exists(account_id).await? {
            Ok(())
        } else {
            Err(CastdeckError::not_found("Account", account_id))
        }
    }
}

//! Persisted notifications
//!
//! The dispatcher records one when a post is published and one when a post
//! fails for good; this service reads them back and marks them read.

use std::sync::Arc;

use crate::error::CastdeckError;
use crate::types::Notification;
use crate::{Database, Result};

pub const DEFAULT_NOTIFICATION_LIMIT: u32 = 50;
pub const MAX_NOTIFICATION_LIMIT: u32 = 500;

#[derive(Clone)]
pub struct NotificationService {
    db: Arc<Database>,
}

impl NotificationService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Newest first; `limit` is clamped to 1..=500
    pub async fn list(&self, unread_only: bool, limit: u32) -> Result<Vec<Notification>> {
        self.db
            .list_notifications(unread_only, limit.clamp(1, MAX_NOTIFICATION_LIMIT))
            .await
    }

    pub async fn mark_read(&self, notification_id: &str) -> Result<()> {
        if self.db.mark_notification_read(notification_id).await? {
            Ok(())
        } else {
            Err(CastdeckError::not_found("Notification", notification_id))
        }
    }

    /// Returns how many notifications changed
    pub async fn mark_all_read(&self) -> Result<u64> {
        self.db.mark_all_notifications_read().await
    }
}

//! Core types for Castdeck

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Drop sub-second precision; the store keeps whole seconds
pub fn truncate_to_secs(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(dt.timestamp(), 0).unwrap_or(dt)
}

pub(crate) fn now_secs() -> DateTime<Utc> {
    truncate_to_secs(Utc::now())
}

/// Lifecycle of a scheduled post
///
/// `Scheduled` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Scheduled,
    Published,
    Failed,
    Cancelled,
}

impl PostStatus {
    pub const ALL: [PostStatus; 4] = [
        PostStatus::Scheduled,
        PostStatus::Published,
        PostStatus::Failed,
        PostStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
            PostStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PostStatus::Scheduled)
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(PostStatus::Scheduled),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            "cancelled" => Ok(PostStatus::Cancelled),
            other => Err(format!("unknown post status '{}'", other)),
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledPost {
    pub id: String,
    pub account_id: String,
    pub content: String,
    pub media_refs: Vec<String>,
    pub scheduled_at: DateTime<Utc>,
    pub status: PostStatus,
    /// Publish attempts made so far
    pub attempts: u32,
    pub last_error: Option<String>,
    pub platform_post_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledPost {
    pub fn new(
        account_id: String,
        content: String,
        media_refs: Vec<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        let now = now_secs();
        Self {
            id: Uuid::new_v4().to_string(),
            account_id,
            content,
            media_refs,
            scheduled_at: truncate_to_secs(scheduled_at),
            status: PostStatus::Scheduled,
            attempts: 0,
            last_error: None,
            platform_post_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A connected social account
///
/// Tokens never leave the process: they are skipped when serializing.
#[derive(Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub platform: String,
    pub platform_user_id: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub access_token: String,
    #[serde(skip_serializing, default)]
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_sync: Option<DateTime<Utc>>,
}

impl Account {
    pub fn from_handle(platform: &str, handle: AccountHandle) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            platform: platform.to_string(),
            platform_user_id: handle.platform_user_id,
            username: handle.username,
            access_token: handle.access_token,
            refresh_token: handle.refresh_token,
            created_at: now_secs(),
            last_sync: None,
        }
    }

    /// Credentials a publisher needs to act for this account
    pub fn handle(&self) -> AccountHandle {
        AccountHandle {
            platform_user_id: self.platform_user_id.clone(),
            username: self.username.clone(),
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("platform", &self.platform)
            .field("platform_user_id", &self.platform_user_id)
            .field("username", &self.username)
            .field("access_token", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("last_sync", &self.last_sync)
            .finish()
    }
}

/// What a publisher returns from `connect` and receives on every call
#[derive(Clone, PartialEq)]
pub struct AccountHandle {
    pub platform_user_id: String,
    pub username: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for AccountHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountHandle")
            .field("platform_user_id", &self.platform_user_id)
            .field("username", &self.username)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentTemplate {
    pub id: String,
    pub name: String,
    pub content: String,
    /// Default values for placeholders
    pub variables: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngagementRecord {
    pub post_id: String,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub sentiment: f64,
    pub last_updated: DateTime<Utc>,
}

impl EngagementRecord {
    pub fn total_interactions(&self) -> i64 {
        self.likes + self.comments + self.shares
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngagementSummary {
    pub total_likes: i64,
    pub total_comments: i64,
    pub total_shares: i64,
    pub average_sentiment: f64,
}

/// Counters reported by a platform for one post
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PostMetrics {
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    /// Platforms rarely report sentiment; `None` keeps the stored score
    pub sentiment: Option<f64>,
}

/// A post ranked by engagement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostPerformance {
    pub post_id: String,
    pub content: String,
    pub scheduled_at: DateTime<Utc>,
    pub engagement: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HashtagStats {
    pub tag: String,
    pub total_posts: i64,
    pub total_engagement: i64,
    pub average_engagement: f64,
}

/// A file in the media library
///
/// `path` is where the bytes live on disk and can be passed as a media
/// reference when scheduling a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaFile {
    pub id: String,
    /// Name the file was uploaded with
    pub filename: String,
    pub path: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(NotificationKind::Info),
            "success" => Ok(NotificationKind::Success),
            "warning" => Ok(NotificationKind::Warning),
            "error" => Ok(NotificationKind::Error),
            other => Err(format!("unknown notification kind '{}'", other)),
        }
    }
}

/// A stored message about something that happened to a post or account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub message: String,
    pub post_id: Option<String>,
    pub account_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            message: message.into(),
            post_id: None,
            account_id: None,
            read: false,
            created_at: now_secs(),
        }
    }

    pub fn for_post(mut self, post_id: &str, account_id: &str) -> Self {
        self.post_id = Some(post_id.to_string());
        self.account_id = Some(account_id.to_string());
        self
    }
}

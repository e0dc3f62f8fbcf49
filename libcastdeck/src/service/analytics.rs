//! Account and post analytics
//!
//! Everything here is derived from stored engagement counters; nothing is
//! fetched from the platforms. Platforms do not report follower counts or
//! impressions to Castdeck, so rates are expressed per published post.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::CastdeckError;
use crate::types::{now_secs, HashtagStats, PostPerformance, PostStatus};
use crate::{Database, Result};

pub const DEFAULT_REPORT_PERIOD: &str = "30d";
pub const MAX_REPORT_DAYS: i64 = 365;

const REPORT_TOP_POSTS: u32 = 5;
const REPORT_TOP_HASHTAGS: u32 = 5;

/// Scores at or beyond this distance from zero count as a clear lean
const SENTIMENT_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn from_score(score: f64) -> Self {
        if score >= SENTIMENT_THRESHOLD {
            SentimentLabel::Positive
        } else if score <= -SENTIMENT_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountAnalytics {
    pub account_id: String,
    pub platform: String,
    pub username: String,
    pub published_posts: i64,
    pub scheduled_posts: i64,
    pub failed_posts: i64,
    pub total_engagement: i64,
    pub engagement_per_post: f64,
    pub average_sentiment: f64,
    pub best_performing_post: Option<PostPerformance>,
    pub last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostAnalytics {
    pub post_id: String,
    pub account_id: String,
    pub platform_post_id: Option<String>,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub interactions: i64,
    pub sentiment: f64,
    pub sentiment_label: SentimentLabel,
    /// Interactions relative to the account's per-post average; `None`
    /// while the account has no engagement at all
    pub relative_performance: Option<f64>,
    pub hashtags: Vec<HashtagStats>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsReport {
    pub account_id: String,
    pub period_days: i64,
    pub since: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub published_posts: i64,
    pub total_likes: i64,
    pub total_comments: i64,
    pub total_shares: i64,
    pub total_engagement: i64,
    pub engagement_per_post: f64,
    pub average_sentiment: f64,
    pub top_posts: Vec<PostPerformance>,
    pub top_hashtags: Vec<HashtagStats>,
    pub recommendations: Vec<String>,
}

#[derive(Clone)]
pub struct AnalyticsService {
    db: Arc<Database>,
}

impl AnalyticsService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn account(&self, account_id: &str) -> Result<AccountAnalytics> {
        let account = self
            .db
            .get_account(account_id)
            .await?
            .ok_or_else(|| CastdeckError::not_found("Account", account_id))?;

        let counts = self.db.count_posts_by_status(Some(account_id)).await?;
        let (published, summary) = self.db.published_totals(account_id, None).await?;
        let total_engagement = summary.total_likes + summary.total_comments + summary.total_shares;
        let best_performing_post = self.db.top_posts(account_id, 1).await?.into_iter().next();

        Ok(AccountAnalytics {
            account_id: account.id,
            platform: account.platform,
            username: account.username,
            published_posts: published,
            scheduled_posts: counts.get(&PostStatus::Scheduled).copied().unwrap_or(0),
            failed_posts: counts.get(&PostStatus::Failed).copied().unwrap_or(0),
            total_engagement,
            engagement_per_post: per_post(total_engagement, published),
            average_sentiment: summary.average_sentiment,
            best_performing_post,
            last_sync: account.last_sync,
        })
    }

    /// Analytics for one published post
    ///
    /// # Errors
    ///
    /// `NotFound` if the post does not exist or has not been published.
    pub async fn post(&self, post_id: &str) -> Result<PostAnalytics> {
        let post = match self.db.get_post(post_id).await? {
            Some(post) if post.status == PostStatus::Published => post,
            _ => return Err(CastdeckError::not_found("Published post", post_id)),
        };
        let record = self
            .db
            .get_engagement(post_id)
            .await?
            .ok_or_else(|| CastdeckError::not_found("Engagement record", post_id))?;

        let (published, summary) = self.db.published_totals(&post.account_id, None).await?;
        let account_total = summary.total_likes + summary.total_comments + summary.total_shares;
        let average = per_post(account_total, published);
        let interactions = record.total_interactions();
        let relative_performance = (average > 0.0).then(|| interactions as f64 / average);

        Ok(PostAnalytics {
            post_id: post.id,
            account_id: post.account_id,
            platform_post_id: post.platform_post_id,
            likes: record.likes,
            comments: record.comments,
            shares: record.shares,
            interactions,
            sentiment: record.sentiment,
            sentiment_label: SentimentLabel::from_score(record.sentiment),
            relative_performance,
            hashtags: self.db.hashtag_stats_for_post(post_id).await?,
            last_updated: record.last_updated,
        })
    }

    /// Summary of an account over a trailing period such as `30d` or `4w`
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a malformed period or one outside 1..=365 days
    /// - `NotFound` if the account does not exist
    pub async fn report(&self, account_id: &str, period: &str) -> Result<AnalyticsReport> {
        let days = parse_period(period)?;
        if !self.db.account_exists(account_id).await? {
            return Err(CastdeckError::not_found("Account", account_id));
        }

        let generated_at = now_secs();
        let since = generated_at - Duration::days(days);

        let (published, summary) = self.db.published_totals(account_id, Some(since)).await?;
        let total_engagement = summary.total_likes + summary.total_comments + summary.total_shares;
        let top_posts = self
            .db
            .top_posts_since(account_id, Some(since), REPORT_TOP_POSTS)
            .await?;
        let top_hashtags = self
            .db
            .account_hashtag_stats(account_id, Some(since), REPORT_TOP_HASHTAGS)
            .await?;
        let failed = self
            .db
            .count_posts_by_status(Some(account_id))
            .await?
            .get(&PostStatus::Failed)
            .copied()
            .unwrap_or(0);

        let mut report = AnalyticsReport {
            account_id: account_id.to_string(),
            period_days: days,
            since,
            generated_at,
            published_posts: published,
            total_likes: summary.total_likes,
            total_comments: summary.total_comments,
            total_shares: summary.total_shares,
            total_engagement,
            engagement_per_post: per_post(total_engagement, published),
            average_sentiment: summary.average_sentiment,
            top_posts,
            top_hashtags,
            recommendations: Vec::new(),
        };
        report.recommendations = recommendations(&report, failed);

        Ok(report)
    }
}

fn per_post(total: i64, posts: i64) -> f64 {
    if posts > 0 {
        total as f64 / posts as f64
    } else {
        0.0
    }
}

/// Parse `<n>d` or `<n>w` into a number of days
fn parse_period(period: &str) -> Result<i64> {
    let invalid = || {
        CastdeckError::InvalidArgument(format!(
            "invalid period '{}' (expected e.g. 7d or 4w, at most {} days)",
            period, MAX_REPORT_DAYS
        ))
    };

    let period = period.trim();
    let (number, multiplier) = if let Some(n) = period.strip_suffix('d') {
        (n, 1)
    } else if let Some(n) = period.strip_suffix('w') {
        (n, 7)
    } else {
        return Err(invalid());
    };

    let days = number
        .parse::<i64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(invalid)?;
    if (1..=MAX_REPORT_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(invalid())
    }
}

fn recommendations(report: &AnalyticsReport, failed_posts: i64) -> Vec<String> {
    let mut tips = Vec::new();

    if report.published_posts == 0 {
        tips.push(format!(
            "Nothing was published in the last {} days; schedule a few posts to build a baseline.",
            report.period_days
        ));
    }
    if failed_posts > 0 {
        tips.push(format!(
            "{} post(s) failed to publish; check that the account is still connected.",
            failed_posts
        ));
    }
    if report.published_posts > 0 && report.average_sentiment <= -SENTIMENT_THRESHOLD {
        tips.push(
            "Audience sentiment is negative; review recent replies before posting more."
                .to_string(),
        );
    }
    if let Some(tag) = report
        .top_hashtags
        .iter()
        .find(|t| t.average_engagement > report.engagement_per_post && t.total_engagement > 0)
    {
        tips.push(format!(
            "Posts tagged #{} beat your average engagement; consider using it more often.",
            tag.tag
        ));
    }

    tips
}

//! Engagement records and account roll-ups

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::posts::post_from_row;
use super::{from_ts, Database};
use crate::error::Result;
use crate::types::{EngagementRecord, EngagementSummary, PostPerformance, ScheduledPost};

const TABLE: &str = "engagements";

fn engagement_from_row(row: &SqliteRow) -> Result<EngagementRecord> {
    Ok(EngagementRecord {
        post_id: row.try_get("post_id")?,
        likes: row.try_get("likes")?,
        comments: row.try_get("comments")?,
        shares: row.try_get("shares")?,
        sentiment: row.try_get("sentiment")?,
        last_updated: from_ts(TABLE, row.try_get("last_updated")?)?,
    })
}

impl Database {
    /// Insert or overwrite the counters for a post
    ///
    /// A `None` sentiment keeps the stored score (0 for a new record).
    pub async fn upsert_engagement(
        &self,
        post_id: &str,
        likes: i64,
        comments: i64,
        shares: i64,
        sentiment: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<EngagementRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO engagements (post_id, likes, comments, shares, sentiment, last_updated)
            VALUES (?, ?, ?, ?, COALESCE(?, 0.0), ?)
            ON CONFLICT(post_id) DO UPDATE SET
                likes = excluded.likes,
                comments = excluded.comments,
                shares = excluded.shares,
                sentiment = COALESCE(?, engagements.sentiment),
                last_updated = excluded.last_updated
            RETURNING post_id, likes, comments, shares, sentiment, last_updated
            "#,
        )
        .bind(post_id)
        .bind(likes)
        .bind(comments)
        .bind(shares)
        .bind(sentiment)
        .bind(now.timestamp())
        .bind(sentiment)
        .fetch_one(&self.pool)
        .await?;

        engagement_from_row(&row)
    }

    pub async fn get_engagement(&self, post_id: &str) -> Result<Option<EngagementRecord>> {
        let row = sqlx::query(
            r#"
            SELECT post_id, likes, comments, shares, sentiment, last_updated
            FROM engagements
            WHERE post_id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(engagement_from_row).transpose()
    }

    /// Totals over every engagement record of an account's posts
    pub async fn engagement_summary(&self, account_id: &str) -> Result<EngagementSummary> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(e.likes), 0) AS total_likes,
                   COALESCE(SUM(e.comments), 0) AS total_comments,
                   COALESCE(SUM(e.shares), 0) AS total_shares,
                   COALESCE(AVG(e.sentiment), 0.0) AS average_sentiment
            FROM engagements e
            JOIN scheduled_posts p ON p.id = e.post_id
            WHERE p.account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(EngagementSummary {
            total_likes: row.try_get("total_likes")?,
            total_comments: row.try_get("total_comments")?,
            total_shares: row.try_get("total_shares")?,
            average_sentiment: row.try_get("average_sentiment")?,
        })
    }

    /// Most recently updated records first
    pub async fn recent_engagements(
        &self,
        account_id: &str,
        limit: u32,
    ) -> Result<Vec<EngagementRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT e.post_id, e.likes, e.comments, e.shares, e.sentiment, e.last_updated
            FROM engagements e
            JOIN scheduled_posts p ON p.id = e.post_id
            WHERE p.account_id = ?
            ORDER BY e.last_updated DESC, e.post_id ASC
            LIMIT ?
            "#,
        )
        .bind(account_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(engagement_from_row).collect()
    }

    /// Published posts of an account and the totals of their counters
    ///
    /// `since` limits the count to posts scheduled at or after it.
    pub async fn published_totals(
        &self,
        account_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<(i64, EngagementSummary)> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(p.id) AS published,
                   COALESCE(SUM(e.likes), 0) AS total_likes,
                   COALESCE(SUM(e.comments), 0) AS total_comments,
                   COALESCE(SUM(e.shares), 0) AS total_shares,
                   COALESCE(AVG(e.sentiment), 0.0) AS average_sentiment
            FROM scheduled_posts p
            LEFT JOIN engagements e ON e.post_id = p.id
            WHERE p.account_id = ?
              AND p.status = 'published'
              AND p.scheduled_at >= ?
            "#,
        )
        .bind(account_id)
        .bind(since.map(|t| t.timestamp()).unwrap_or(i64::MIN))
        .fetch_one(&self.pool)
        .await?;

        let summary = EngagementSummary {
            total_likes: row.try_get("total_likes")?,
            total_comments: row.try_get("total_comments")?,
            total_shares: row.try_get("total_shares")?,
            average_sentiment: row.try_get("average_sentiment")?,
        };
        Ok((row.try_get("published")?, summary))
    }

    /// Posts ranked by total interactions (likes + comments + shares)
    pub async fn top_posts(&self, account_id: &str, limit: u32) -> Result<Vec<PostPerformance>> {
        self.top_posts_since(account_id, None, limit).await
    }

    /// Like [`Database::top_posts`], counting only posts scheduled at or
    /// after `since`
    pub async fn top_posts_since(
        &self,
        account_id: &str,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<PostPerformance>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.content, p.scheduled_at,
                   (e.likes + e.comments + e.shares) AS engagement
            FROM engagements e
            JOIN scheduled_posts p ON p.id = e.post_id
            WHERE p.account_id = ?
              AND p.scheduled_at >= ?
            ORDER BY engagement DESC, p.scheduled_at ASC, p.id ASC
            LIMIT ?
            "#,
        )
        .bind(account_id)
        .bind(since.map(|t| t.timestamp()).unwrap_or(i64::MIN))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PostPerformance {
                    post_id: row.try_get("id")?,
                    content: row.try_get("content")?,
                    scheduled_at: from_ts("scheduled_posts", row.try_get("scheduled_at")?)?,
                    engagement: row.try_get("engagement")?,
                })
            })
            .collect()
    }

    /// Published posts whose counters were last refreshed before `stale_before`
    ///
    /// Oldest records first, so a bounded refresh eventually covers all.
    pub async fn stale_published_posts(
        &self,
        stale_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ScheduledPost>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.account_id, p.content, p.media_refs, p.scheduled_at, p.status,
                   p.attempts, p.last_error, p.platform_post_id, p.created_at, p.updated_at
            FROM scheduled_posts p
            JOIN engagements e ON e.post_id = p.id
            WHERE p.status = 'published'
              AND p.platform_post_id IS NOT NULL
              AND e.last_updated < ?
            ORDER BY e.last_updated ASC, p.id ASC
            LIMIT ?
            "#,
        )
        .bind(stale_before.timestamp())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(post_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use chrono::Duration;

    /// Insert a post and drive it to `published` with the given counters
    async fn published_post(
        db: &Database,
        account_id: &str,
        content: &str,
        likes: i64,
        sentiment: f64,
        at: DateTime<Utc>,
    ) -> String {
        let post = insert_post_at(db, account_id, content, at - Duration::minutes(1)).await;
        assert!(db
            .claim_post(&post.id, "t", at, at - Duration::minutes(5))
            .await
            .unwrap());
        assert!(db
            .mark_published(&post.id, "t", &format!("remote-{}", content), at)
            .await
            .unwrap());
        db.upsert_engagement(&post.id, likes, 0, 0, Some(sentiment), at)
            .await
            .unwrap();
        post.id
    }

    #[tokio::test]
    async fn test_summary_sums_and_averages() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();

        published_post(&db, &account.id, "one", 10, 0.5, now).await;
        published_post(&db, &account.id, "two", 20, -0.1, now).await;

        let summary = db.engagement_summary(&account.id).await.unwrap();
        assert_eq!(summary.total_likes, 30);
        assert_eq!(summary.total_comments, 0);
        assert_eq!(summary.total_shares, 0);
        assert!((summary.average_sentiment - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_summary_without_records_is_zero() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;

        let summary = db.engagement_summary(&account.id).await.unwrap();
        assert_eq!(summary.total_likes, 0);
        assert_eq!(summary.average_sentiment, 0.0);
    }

    #[tokio::test]
    async fn test_upsert_without_sentiment_keeps_score() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();
        let post_id = published_post(&db, &account.id, "p", 1, 0.7, now).await;

        let later = now + Duration::minutes(30);
        let record = db
            .upsert_engagement(&post_id, 5, 2, 1, None, later)
            .await
            .unwrap();
        assert_eq!(record.likes, 5);
        assert_eq!(record.total_interactions(), 8);
        assert!((record.sentiment - 0.7).abs() < 1e-9);
        assert_eq!(record.last_updated.timestamp(), later.timestamp());
    }

    #[tokio::test]
    async fn test_negative_counters_rejected_by_schema() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let post_id = published_post(&db, &account.id, "p", 1, 0.0, Utc::now()).await;

        let result = db
            .upsert_engagement(&post_id, -1, 0, 0, None, Utc::now())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_recent_and_top_ordering() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();

        let older = published_post(&db, &account.id, "older", 50, 0.0, now - Duration::hours(2)).await;
        let newer = published_post(&db, &account.id, "newer", 5, 0.0, now).await;

        let recent = db.recent_engagements(&account.id, 10).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|r| r.post_id.as_str()).collect();
        assert_eq!(ids, vec![newer.as_str(), older.as_str()]);

        let limited = db.recent_engagements(&account.id, 1).await.unwrap();
        assert_eq!(limited.len(), 1);

        let top = db.top_posts(&account.id, 10).await.unwrap();
        assert_eq!(top[0].post_id, older);
        assert_eq!(top[0].engagement, 50);
        assert_eq!(top[1].post_id, newer);
    }

    #[tokio::test]
    async fn test_stale_published_posts() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();

        let stale = published_post(&db, &account.id, "stale", 1, 0.0, now - Duration::hours(1)).await;
        published_post(&db, &account.id, "fresh", 1, 0.0, now).await;

        let found = db
            .stale_published_posts(now - Duration::minutes(15), 10)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, stale);
        assert_eq!(found[0].platform_post_id.as_deref(), Some("remote-stale"));
    }

    #[tokio::test]
    async fn test_published_totals_window() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();

        published_post(&db, &account.id, "old", 100, 0.9, now - Duration::days(40)).await;
        let recent = published_post(&db, &account.id, "recent", 10, 0.1, now).await;
        // Published with the zeroed record created at publish time
        let bare = insert_post_at(&db, &account.id, "bare", now - Duration::minutes(2)).await;
        assert!(db.claim_post(&bare.id, "t", now, now).await.unwrap());
        assert!(db.mark_published(&bare.id, "t", "remote-bare", now).await.unwrap());
        // Still scheduled, never counted
        insert_post_at(&db, &account.id, "later", now + Duration::hours(1)).await;

        let (count, summary) = db.published_totals(&account.id, None).await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(summary.total_likes, 110);

        let since = now - Duration::days(30);
        let (count, summary) = db.published_totals(&account.id, Some(since)).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(summary.total_likes, 10);
        assert!((summary.average_sentiment - 0.05).abs() < 1e-9);

        let top = db.top_posts_since(&account.id, Some(since), 5).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].post_id, recent);
        assert_eq!(top[1].post_id, bare.id);
    }
}

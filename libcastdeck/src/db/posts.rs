//! Scheduled post repository
//!
//! Every status change is a single UPDATE guarded by `status = 'scheduled'`,
//! so terminal rows are never touched again and concurrent writers (API
//! cancellation, one or more dispatchers) resolve through SQLite's write
//! serialization: the first guarded UPDATE wins, later ones affect no rows.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::HashMap;

use super::{corrupt, from_ts, Database};
use crate::error::Result;
use crate::types::{PostStatus, ScheduledPost};

const TABLE: &str = "scheduled_posts";

const POST_COLUMNS: &str = "id, account_id, content, media_refs, scheduled_at, status, \
     attempts, last_error, platform_post_id, created_at, updated_at";

pub(super) fn post_from_row(row: &SqliteRow) -> Result<ScheduledPost> {
    let media_json: String = row.try_get("media_refs")?;
    let media_refs: Vec<String> = serde_json::from_str(&media_json)
        .map_err(|e| corrupt(TABLE, format!("media_refs is not a JSON list: {}", e)))?;

    let status_str: String = row.try_get("status")?;
    let status = status_str
        .parse::<PostStatus>()
        .map_err(|e| corrupt(TABLE, e))?;

    let attempts: i64 = row.try_get("attempts")?;

    Ok(ScheduledPost {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        content: row.try_get("content")?,
        media_refs,
        scheduled_at: from_ts(TABLE, row.try_get("scheduled_at")?)?,
        status,
        attempts: u32::try_from(attempts.max(0)).unwrap_or(u32::MAX),
        last_error: row.try_get("last_error")?,
        platform_post_id: row.try_get("platform_post_id")?,
        created_at: from_ts(TABLE, row.try_get("created_at")?)?,
        updated_at: from_ts(TABLE, row.try_get("updated_at")?)?,
    })
}

impl Database {
    /// Insert a new post
    pub async fn insert_post(&self, post: &ScheduledPost) -> Result<()> {
        let media_json = serde_json::to_string(&post.media_refs)
            .map_err(|e| corrupt(TABLE, format!("media_refs not serializable: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO scheduled_posts
                (id, account_id, content, media_refs, scheduled_at, status,
                 attempts, last_error, platform_post_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.account_id)
        .bind(&post.content)
        .bind(media_json)
        .bind(post.scheduled_at.timestamp())
        .bind(post.status.as_str())
        .bind(i64::from(post.attempts))
        .bind(&post.last_error)
        .bind(&post.platform_post_id)
        .bind(post.created_at.timestamp())
        .bind(post.updated_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: &str) -> Result<Option<ScheduledPost>> {
        let sql = format!("SELECT {} FROM scheduled_posts WHERE id = ?", POST_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(post_from_row).transpose()
    }

    /// Posts of one account, ascending by scheduled time
    ///
    /// Both bounds are inclusive; a missing bound does not filter.
    pub async fn list_posts_for_account(
        &self,
        account_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScheduledPost>> {
        let mut where_clauses = vec!["account_id = ?"];
        if start.is_some() {
            where_clauses.push("scheduled_at >= ?");
        }
        if end.is_some() {
            where_clauses.push("scheduled_at <= ?");
        }

        let sql = format!(
            "SELECT {} FROM scheduled_posts WHERE {} ORDER BY scheduled_at ASC, id ASC",
            POST_COLUMNS,
            where_clauses.join(" AND ")
        );

        // Bind in the same order as the WHERE clauses
        let mut query = sqlx::query(&sql).bind(account_id);
        if let Some(s) = start {
            query = query.bind(s.timestamp());
        }
        if let Some(e) = end {
            query = query.bind(e.timestamp());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(post_from_row).collect()
    }

    /// Posts filtered by status and/or account, ascending by scheduled time
    pub async fn list_posts(
        &self,
        status: Option<PostStatus>,
        account_id: Option<&str>,
    ) -> Result<Vec<ScheduledPost>> {
        let mut where_clauses = vec!["1=1"];
        if status.is_some() {
            where_clauses.push("status = ?");
        }
        if account_id.is_some() {
            where_clauses.push("account_id = ?");
        }

        let sql = format!(
            "SELECT {} FROM scheduled_posts WHERE {} ORDER BY scheduled_at ASC, id ASC",
            POST_COLUMNS,
            where_clauses.join(" AND ")
        );

        let mut query = sqlx::query(&sql);
        if let Some(s) = status {
            query = query.bind(s.as_str());
        }
        if let Some(a) = account_id {
            query = query.bind(a);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(post_from_row).collect()
    }

    /// Number of posts in each status (statuses with no posts map to 0)
    ///
    /// `account_id` narrows the count to one account.
    pub async fn count_posts_by_status(
        &self,
        account_id: Option<&str>,
    ) -> Result<HashMap<PostStatus, i64>> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS n
            FROM scheduled_posts
            WHERE (? IS NULL OR account_id = ?)
            GROUP BY status
            "#,
        )
        .bind(account_id)
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts: HashMap<PostStatus, i64> =
            PostStatus::ALL.iter().map(|s| (*s, 0)).collect();

        for row in rows {
            let status_str: String = row.try_get("status")?;
            let status = status_str
                .parse::<PostStatus>()
                .map_err(|e| corrupt(TABLE, e))?;
            counts.insert(status, row.try_get("n")?);
        }

        Ok(counts)
    }

    /// Move a post from `scheduled` to `cancelled`
    ///
    /// Fails (returns false) when the post is missing, already terminal, or
    /// held by a dispatcher whose claim is newer than `stale_before`.
    pub async fn cancel_post(
        &self,
        post_id: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'cancelled', claim_token = NULL, claimed_at = NULL, updated_at = ?
            WHERE id = ?
              AND status = 'scheduled'
              AND (claim_token IS NULL OR claimed_at < ?)
            "#,
        )
        .bind(now.timestamp())
        .bind(post_id)
        .bind(stale_before.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Posts ready for dispatch at `now`
    ///
    /// Ordered by scheduled time, then id. Posts waiting out a retry delay or
    /// held by a live claim are excluded.
    pub async fn due_posts(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ScheduledPost>> {
        let sql = format!(
            r#"
            SELECT {} FROM scheduled_posts
            WHERE status = 'scheduled'
              AND scheduled_at <= ?
              AND (retry_at IS NULL OR retry_at <= ?)
              AND (claim_token IS NULL OR claimed_at < ?)
            ORDER BY scheduled_at ASC, id ASC
            LIMIT ?
            "#,
            POST_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(now.timestamp())
            .bind(now.timestamp())
            .bind(stale_before.timestamp())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(post_from_row).collect()
    }

    /// Try to take exclusive ownership of a due post
    ///
    /// Returns true only for the single caller whose UPDATE matched. The
    /// same due conditions as [`Database::due_posts`] are re-checked, so a
    /// post cancelled or claimed since the scan is not taken.
    pub async fn claim_post(
        &self,
        post_id: &str,
        token: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET claim_token = ?, claimed_at = ?
            WHERE id = ?
              AND status = 'scheduled'
              AND scheduled_at <= ?
              AND (retry_at IS NULL OR retry_at <= ?)
              AND (claim_token IS NULL OR claimed_at < ?)
            "#,
        )
        .bind(token)
        .bind(now.timestamp())
        .bind(post_id)
        .bind(now.timestamp())
        .bind(now.timestamp())
        .bind(stale_before.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Record a successful publish and create the post's engagement record
    ///
    /// Both writes share one transaction. Returns false if `token` no longer
    /// holds the claim, in which case nothing is written.
    pub async fn mark_published(
        &self,
        post_id: &str,
        token: &str,
        platform_post_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'published', platform_post_id = ?, attempts = attempts + 1,
                last_error = NULL, claim_token = NULL, claimed_at = NULL, retry_at = NULL,
                updated_at = ?
            WHERE id = ? AND status = 'scheduled' AND claim_token = ?
            "#,
        )
        .bind(platform_post_id)
        .bind(now.timestamp())
        .bind(post_id)
        .bind(token)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO engagements (post_id, likes, comments, shares, sentiment, last_updated)
            VALUES (?, 0, 0, 0, 0, ?)
            ON CONFLICT(post_id) DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Release a claim after a retryable failure
    ///
    /// The post stays `scheduled` but is not due again before `retry_at`.
    pub async fn defer_post(
        &self,
        post_id: &str,
        token: &str,
        error: &str,
        retry_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET attempts = attempts + 1, last_error = ?, retry_at = ?,
                claim_token = NULL, claimed_at = NULL, updated_at = ?
            WHERE id = ? AND status = 'scheduled' AND claim_token = ?
            "#,
        )
        .bind(error)
        .bind(retry_at.timestamp())
        .bind(now.timestamp())
        .bind(post_id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Terminal failure: the post will not be attempted again
    pub async fn mark_failed(
        &self,
        post_id: &str,
        token: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'failed', attempts = attempts + 1, last_error = ?,
                claim_token = NULL, claimed_at = NULL, retry_at = NULL, updated_at = ?
            WHERE id = ? AND status = 'scheduled' AND claim_token = ?
            "#,
        )
        .bind(error)
        .bind(now.timestamp())
        .bind(post_id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;

        let post = ScheduledPost::new(
            account.id.clone(),
            "Launch day #rust".to_string(),
            vec!["https://cdn.example/a.png".to_string(), "b.jpg".to_string()],
            Utc::now() + Duration::hours(2),
        );
        db.insert_post(&post).await.unwrap();

        let loaded = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded, post);
    }

    #[tokio::test]
    async fn test_get_nonexistent_post_returns_none() {
        let (db, _temp_dir) = test_db().await;
        assert!(db.get_post("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_for_account_orders_and_filters() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let other = insert_test_account(&db, "mock").await;
        let base = crate::types::truncate_to_secs(Utc::now());

        let late = insert_post_at(&db, &account.id, "late", base + Duration::hours(3)).await;
        let early = insert_post_at(&db, &account.id, "early", base + Duration::hours(1)).await;
        let mid = insert_post_at(&db, &account.id, "mid", base + Duration::hours(2)).await;
        insert_post_at(&db, &other.id, "other", base + Duration::hours(2)).await;

        let all = db.list_posts_for_account(&account.id, None, None).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![early.id.as_str(), mid.id.as_str(), late.id.as_str()]);

        // Inclusive bounds on both ends
        let ranged = db
            .list_posts_for_account(
                &account.id,
                Some(base + Duration::hours(1)),
                Some(base + Duration::hours(2)),
            )
            .await
            .unwrap();
        let ids: Vec<&str> = ranged.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![early.id.as_str(), mid.id.as_str()]);

        let open_start = db
            .list_posts_for_account(&account.id, None, Some(base + Duration::minutes(90)))
            .await
            .unwrap();
        assert_eq!(open_start.len(), 1);
        assert_eq!(open_start[0].id, early.id);
    }

    #[tokio::test]
    async fn test_cancel_only_from_scheduled() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();
        let post = insert_post_at(&db, &account.id, "bye", now + Duration::hours(1)).await;

        assert!(db.cancel_post(&post.id, now, now).await.unwrap());
        assert!(!db.cancel_post(&post.id, now, now).await.unwrap());
        assert!(!db.cancel_post("missing", now, now).await.unwrap());

        let loaded = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();
        let stale_before = now - Duration::minutes(5);
        let post = insert_post_at(&db, &account.id, "due", now - Duration::seconds(10)).await;

        assert!(db.claim_post(&post.id, "a", now, stale_before).await.unwrap());
        assert!(!db.claim_post(&post.id, "b", now, stale_before).await.unwrap());

        // A live claim hides the post from scans and blocks cancellation
        assert!(db.due_posts(now, stale_before, 10).await.unwrap().is_empty());
        assert!(!db.cancel_post(&post.id, now, stale_before).await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_claim_can_be_taken_over() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();
        let post = insert_post_at(&db, &account.id, "due", now - Duration::minutes(20)).await;

        let crashed_at = now - Duration::minutes(10);
        assert!(db
            .claim_post(&post.id, "crashed", crashed_at, crashed_at - Duration::minutes(5))
            .await
            .unwrap());

        let stale_before = now - Duration::minutes(5);
        assert_eq!(db.due_posts(now, stale_before, 10).await.unwrap().len(), 1);
        assert!(db.claim_post(&post.id, "fresh", now, stale_before).await.unwrap());

        // The old owner can no longer finish the post
        assert!(!db.mark_published(&post.id, "crashed", "x", now).await.unwrap());
        assert!(db.mark_published(&post.id, "fresh", "x", now).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_and_claim_race_has_one_winner() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();
        let stale_before = now - Duration::minutes(5);
        let post = insert_post_at(&db, &account.id, "racy", now - Duration::seconds(1)).await;

        let (cancelled, claimed) = tokio::join!(
            db.cancel_post(&post.id, now, stale_before),
            db.claim_post(&post.id, "dispatcher", now, stale_before),
        );
        let cancelled = cancelled.unwrap();
        let claimed = claimed.unwrap();
        assert!(cancelled ^ claimed, "exactly one side must win");
    }

    #[tokio::test]
    async fn test_due_posts_order_and_filters() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = crate::types::truncate_to_secs(Utc::now());
        let stale_before = now - Duration::minutes(5);

        let second = insert_post_at(&db, &account.id, "second", now - Duration::minutes(1)).await;
        let first = insert_post_at(&db, &account.id, "first", now - Duration::minutes(2)).await;
        insert_post_at(&db, &account.id, "future", now + Duration::minutes(1)).await;
        let cancelled = insert_post_at(&db, &account.id, "gone", now - Duration::minutes(3)).await;
        db.cancel_post(&cancelled.id, now, stale_before).await.unwrap();

        let due = db.due_posts(now, stale_before, 10).await.unwrap();
        let ids: Vec<&str> = due.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);

        let limited = db.due_posts(now, stale_before, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, first.id);
    }

    #[tokio::test]
    async fn test_same_time_ties_break_by_id() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();
        let when = now - Duration::minutes(1);

        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(insert_post_at(&db, &account.id, &format!("p{}", i), when).await.id);
        }
        ids.sort();

        let due = db.due_posts(now, now - Duration::minutes(5), 10).await.unwrap();
        let due_ids: Vec<String> = due.into_iter().map(|p| p.id).collect();
        assert_eq!(due_ids, ids);
    }

    #[tokio::test]
    async fn test_mark_published_creates_engagement() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();
        let post = insert_post_at(&db, &account.id, "ship it", now - Duration::seconds(5)).await;

        assert!(db.claim_post(&post.id, "t", now, now - Duration::minutes(5)).await.unwrap());
        assert!(db.mark_published(&post.id, "t", "tweet-1", now).await.unwrap());

        let loaded = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Published);
        assert_eq!(loaded.platform_post_id.as_deref(), Some("tweet-1"));
        assert_eq!(loaded.attempts, 1);

        let engagement = db.get_engagement(&post.id).await.unwrap().unwrap();
        assert_eq!(engagement.likes, 0);
        assert_eq!(engagement.comments, 0);
        assert_eq!(engagement.shares, 0);
        assert_eq!(engagement.sentiment, 0.0);

        // Terminal: neither cancellation nor failure can touch it now
        assert!(!db.cancel_post(&post.id, now, now).await.unwrap());
        assert!(!db.mark_failed(&post.id, "t", "late", now).await.unwrap());
    }

    #[tokio::test]
    async fn test_defer_post_hides_until_retry_at() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();
        let stale_before = now - Duration::minutes(5);
        let post = insert_post_at(&db, &account.id, "flaky", now - Duration::seconds(5)).await;

        assert!(db.claim_post(&post.id, "t", now, stale_before).await.unwrap());
        let retry_at = now + Duration::seconds(60);
        assert!(db
            .defer_post(&post.id, "t", "Network error: reset", retry_at, now)
            .await
            .unwrap());

        let loaded = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Scheduled);
        assert_eq!(loaded.attempts, 1);
        assert_eq!(loaded.last_error.as_deref(), Some("Network error: reset"));

        assert!(db.due_posts(now, stale_before, 10).await.unwrap().is_empty());
        let later = now + Duration::seconds(61);
        assert_eq!(db.due_posts(later, stale_before, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_failed_records_reason() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();
        let post = insert_post_at(&db, &account.id, "doomed", now - Duration::seconds(5)).await;

        assert!(db.claim_post(&post.id, "t", now, now - Duration::minutes(5)).await.unwrap());
        assert!(db.mark_failed(&post.id, "t", "Authentication failed: 401", now).await.unwrap());

        let loaded = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Failed);
        assert_eq!(loaded.last_error.as_deref(), Some("Authentication failed: 401"));
        assert!(db.get_engagement(&post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_count_posts_by_status() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();

        insert_post_at(&db, &account.id, "a", now + Duration::hours(1)).await;
        insert_post_at(&db, &account.id, "b", now + Duration::hours(2)).await;
        let c = insert_post_at(&db, &account.id, "c", now + Duration::hours(3)).await;
        db.cancel_post(&c.id, now, now).await.unwrap();

        let other = insert_test_account(&db, "linkedin").await;
        insert_post_at(&db, &other.id, "d", now + Duration::hours(1)).await;

        let counts = db.count_posts_by_status(None).await.unwrap();
        assert_eq!(counts[&PostStatus::Scheduled], 3);
        assert_eq!(counts[&PostStatus::Cancelled], 1);
        assert_eq!(counts[&PostStatus::Published], 0);
        assert_eq!(counts[&PostStatus::Failed], 0);

        let counts = db.count_posts_by_status(Some(&account.id)).await.unwrap();
        assert_eq!(counts[&PostStatus::Scheduled], 2);
        assert_eq!(counts[&PostStatus::Cancelled], 1);

        let scheduled = db
            .list_posts(Some(PostStatus::Scheduled), Some(&account.id))
            .await
            .unwrap();
        assert_eq!(scheduled.len(), 2);
    }
}

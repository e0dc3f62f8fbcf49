use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Database;
use crate::error::Result;
use crate::types::HashtagStats;

const STATS_SELECT: &str = r#"
    SELECT h.tag AS tag,
           COUNT(ph.post_id) AS total_posts,
           COALESCE(SUM(e.likes + e.comments + e.shares), 0) AS total_engagement
    FROM hashtags h
    LEFT JOIN post_hashtags ph ON ph.tag = h.tag
    LEFT JOIN engagements e ON e.post_id = ph.post_id
"#;

fn stats_from_row(row: &SqliteRow) -> Result<HashtagStats> {
    let total_posts: i64 = row.try_get("total_posts")?;
    let total_engagement: i64 = row.try_get("total_engagement")?;
    let average_engagement = if total_posts > 0 {
        total_engagement as f64 / total_posts as f64
    } else {
        0.0
    };

    Ok(HashtagStats {
        tag: row.try_get("tag")?,
        total_posts,
        total_engagement,
        average_engagement,
    })
}

impl Database {
    /// Record the tags of a post; existing tags and links are left alone
    pub async fn link_hashtags(
        &self,
        post_id: &str,
        tags: &[String],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for tag in tags {
            sqlx::query("INSERT INTO hashtags (tag, first_seen) VALUES (?, ?) ON CONFLICT(tag) DO NOTHING")
                .bind(tag)
                .bind(now.timestamp())
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "INSERT INTO post_hashtags (post_id, tag) VALUES (?, ?) ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(tag)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn hashtag_stats(&self, tag: &str) -> Result<Option<HashtagStats>> {
        let sql = format!("{} WHERE h.tag = ? GROUP BY h.tag", STATS_SELECT);
        let row = sqlx::query(&sql)
            .bind(tag)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(stats_from_row).transpose()
    }

    /// Every known tag, highest total engagement first
    ///
    /// `None` returns all tags.
    pub async fn hashtag_stats_ranked(&self, limit: Option<u32>) -> Result<Vec<HashtagStats>> {
        let sql = format!(
            "{} GROUP BY h.tag ORDER BY total_engagement DESC, total_posts DESC, h.tag ASC LIMIT ?",
            STATS_SELECT
        );
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(i64::from).unwrap_or(-1);

        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        rows.iter().map(stats_from_row).collect()
    }

    /// Global stats for every tag linked to a post, by tag name
    pub async fn hashtag_stats_for_post(&self, post_id: &str) -> Result<Vec<HashtagStats>> {
        let sql = format!(
            "{} WHERE h.tag IN (SELECT tag FROM post_hashtags WHERE post_id = ?) GROUP BY h.tag ORDER BY h.tag ASC",
            STATS_SELECT
        );
        let rows = sqlx::query(&sql).bind(post_id).fetch_all(&self.pool).await?;
        rows.iter().map(stats_from_row).collect()
    }

    /// Tag stats over one account's posts scheduled at or after `since`
    pub async fn account_hashtag_stats(
        &self,
        account_id: &str,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<HashtagStats>> {
        let rows = sqlx::query(
            r#"
            SELECT ph.tag AS tag,
                   COUNT(ph.post_id) AS total_posts,
                   COALESCE(SUM(e.likes + e.comments + e.shares), 0) AS total_engagement
            FROM post_hashtags ph
            JOIN scheduled_posts p ON p.id = ph.post_id
            LEFT JOIN engagements e ON e.post_id = ph.post_id
            WHERE p.account_id = ?
              AND p.scheduled_at >= ?
            GROUP BY ph.tag
            ORDER BY total_engagement DESC, total_posts DESC, ph.tag ASC
            LIMIT ?
            "#,
        )
        .bind(account_id)
        .bind(since.map(|t| t.timestamp()).unwrap_or(i64::MIN))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(stats_from_row).collect()
    }
}

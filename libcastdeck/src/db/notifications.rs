use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{corrupt, from_ts, Database};
use crate::error::Result;
use crate::types::{Notification, NotificationKind};

const TABLE: &str = "notifications";

fn notification_from_row(row: &SqliteRow) -> Result<Notification> {
    let kind = row
        .try_get::<String, _>("kind")?
        .parse::<NotificationKind>()
        .map_err(|e| corrupt(TABLE, e))?;

    Ok(Notification {
        id: row.try_get("id")?,
        kind,
        message: row.try_get("message")?,
        post_id: row.try_get("post_id")?,
        account_id: row.try_get("account_id")?,
        read: row.try_get::<i64, _>("read")? != 0,
        created_at: from_ts(TABLE, row.try_get("created_at")?)?,
    })
}

impl Database {
    pub async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, kind, message, post_id, account_id, read, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&notification.id)
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(&notification.post_id)
        .bind(&notification.account_id)
        .bind(notification.read as i64)
        .bind(notification.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest first, optionally skipping ones already read
    pub async fn list_notifications(
        &self,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, message, post_id, account_id, read, created_at
            FROM notifications
            WHERE (? = 0 OR read = 0)
            ORDER BY created_at DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(unread_only as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }

    /// Returns false when no such notification exists
    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ?")
            .bind(notification_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_notifications_read(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE read = 0")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_unread_filter_and_ordering() {
        let (db, _temp_dir) = test_db().await;

        let mut older = Notification::new(NotificationKind::Info, "older");
        older.created_at -= Duration::minutes(5);
        let newer = Notification::new(NotificationKind::Error, "newer").for_post("p1", "a1");
        db.insert_notification(&older).await.unwrap();
        db.insert_notification(&newer).await.unwrap();

        let all = db.list_notifications(false, 50).await.unwrap();
        assert_eq!(all, vec![newer.clone(), older.clone()]);

        assert!(db.mark_notification_read(&newer.id).await.unwrap());
        assert!(!db.mark_notification_read("missing").await.unwrap());

        let unread = db.list_notifications(true, 50).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, older.id);

        assert_eq!(db.mark_all_notifications_read().await.unwrap(), 1);
        assert!(db.list_notifications(true, 50).await.unwrap().is_empty());
        assert_eq!(db.list_notifications(false, 1).await.unwrap().len(), 1);
    }
}

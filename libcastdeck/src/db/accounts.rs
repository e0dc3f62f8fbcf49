use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{from_opt_ts, from_ts, Database};
use crate::error::Result;
use crate::types::Account;

const TABLE: &str = "accounts";

fn account_from_row(row: &SqliteRow) -> Result<Account> {
    Ok(Account {
        id: row.try_get("id")?,
        platform: row.try_get("platform")?,
        platform_user_id: row.try_get("platform_user_id")?,
        username: row.try_get("username")?,
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        created_at: from_ts(TABLE, row.try_get("created_at")?)?,
        last_sync: from_opt_ts(TABLE, row.try_get("last_sync")?)?,
    })
}

impl Database {
    pub async fn insert_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts
                (id, platform, platform_user_id, username, access_token, refresh_token,
                 created_at, last_sync)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.platform)
        .bind(&account.platform_user_id)
        .bind(&account.username)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(account.created_at.timestamp())
        .bind(account.last_sync.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, platform, platform_user_id, username, access_token, refresh_token,
                   created_at, last_sync
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    /// All accounts, oldest first
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, platform, platform_user_id, username, access_token, refresh_token,
                   created_at, last_sync
            FROM accounts
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(account_from_row).collect()
    }

    pub async fn account_exists(&self, account_id: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM accounts WHERE id = ?")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Remove an account together with its posts, counters and tag links
    ///
    /// Refused (returns false) while a dispatcher holds a claim on one of the
    /// account's posts that is newer than `stale_before`, and when the
    /// account does not exist.
    pub async fn delete_account(
        &self,
        account_id: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM accounts
            WHERE id = ?
              AND NOT EXISTS (
                  SELECT 1 FROM scheduled_posts
                  WHERE account_id = ?
                    AND status = 'scheduled'
                    AND claim_token IS NOT NULL
                    AND claimed_at >= ?
              )
            "#,
        )
        .bind(account_id)
        .bind(account_id)
        .bind(stale_before.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record that metrics were pulled for the account
    pub async fn touch_account_sync(&self, account_id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE accounts SET last_sync = ? WHERE id = ?")
            .bind(at.timestamp())
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_account_round_trip_keeps_tokens() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "twitter").await;

        let loaded = db.get_account(&account.id).await.unwrap().unwrap();
        assert_eq!(loaded.platform, "twitter");
        assert_eq!(loaded.username, "tester");
        assert_eq!(loaded.access_token, "token");
        assert!(loaded.refresh_token.is_none());
        assert!(loaded.last_sync.is_none());
        assert_eq!(loaded.created_at, account.created_at);
    }

    #[tokio::test]
    async fn test_account_exists() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;

        assert!(db.account_exists(&account.id).await.unwrap());
        assert!(!db.account_exists("nobody").await.unwrap());
        assert!(db.get_account("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_and_touch_sync() {
        let (db, _temp_dir) = test_db().await;
        let a = insert_test_account(&db, "mock").await;
        insert_test_account(&db, "linkedin").await;

        assert_eq!(db.list_accounts().await.unwrap().len(), 2);

        let at = crate::types::truncate_to_secs(Utc::now());
        db.touch_account_sync(&a.id, at).await.unwrap();
        let loaded = db.get_account(&a.id).await.unwrap().unwrap();
        assert_eq!(loaded.last_sync, Some(at));
    }

    #[tokio::test]
    async fn test_delete_account_cascades() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let keep = insert_test_account(&db, "linkedin").await;
        let now = Utc::now();

        let post = insert_post_at(&db, &account.id, "#gone", now - chrono::Duration::minutes(1)).await;
        db.link_hashtags(&post.id, &["gone".to_string()], now).await.unwrap();
        let kept = insert_post_at(&db, &keep.id, "stays", now).await;

        assert!(db.delete_account(&account.id, now).await.unwrap());
        assert!(!db.account_exists(&account.id).await.unwrap());
        assert!(db.get_post(&post.id).await.unwrap().is_none());
        assert_eq!(db.hashtag_stats("gone").await.unwrap().unwrap().total_posts, 0);
        assert!(db.get_post(&kept.id).await.unwrap().is_some());

        assert!(!db.delete_account(&account.id, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_account_refused_while_claimed() {
        let (db, _temp_dir) = test_db().await;
        let account = insert_test_account(&db, "mock").await;
        let now = Utc::now();
        let post = insert_post_at(&db, &account.id, "in flight", now - chrono::Duration::minutes(1)).await;
        assert!(db.claim_post(&post.id, "t", now, now - chrono::Duration::minutes(5)).await.unwrap());

        let stale_before = now - chrono::Duration::minutes(5);
        assert!(!db.delete_account(&account.id, stale_before).await.unwrap());
        assert!(db.account_exists(&account.id).await.unwrap());

        // An abandoned claim no longer blocks removal
        let later = now + chrono::Duration::minutes(10);
        assert!(db.delete_account(&account.id, later - chrono::Duration::minutes(5)).await.unwrap());
    }
}

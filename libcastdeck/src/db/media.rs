//! Media library rows
//!
//! Only metadata lives here; the service layer owns the files on disk.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{from_ts, Database};
use crate::error::Result;
use crate::types::MediaFile;

const TABLE: &str = "media_files";

fn media_from_row(row: &SqliteRow) -> Result<MediaFile> {
    Ok(MediaFile {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        path: row.try_get("path")?,
        mime_type: row.try_get("mime_type")?,
        size_bytes: row.try_get("size_bytes")?,
        created_at: from_ts(TABLE, row.try_get("created_at")?)?,
    })
}

impl Database {
    pub async fn insert_media(&self, media: &MediaFile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO media_files (id, filename, stored_name, mime_type, size_bytes, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&media.id)
        .bind(&media.filename)
        .bind(&media.path)
        .bind(&media.mime_type)
        .bind(media.size_bytes)
        .bind(media.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_media(&self, media_id: &str) -> Result<Option<MediaFile>> {
        let row = sqlx::query(
            r#"
            SELECT id, filename, stored_name AS path, mime_type, size_bytes, created_at
            FROM media_files
            WHERE id = ?
            "#,
        )
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(media_from_row).transpose()
    }

    /// Newest uploads first
    pub async fn list_media(&self) -> Result<Vec<MediaFile>> {
        let rows = sqlx::query(
            r#"
            SELECT id, filename, stored_name AS path, mime_type, size_bytes, created_at
            FROM media_files
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(media_from_row).collect()
    }

    /// Remove a row, returning it so the caller can delete the file
    pub async fn delete_media(&self, media_id: &str) -> Result<Option<MediaFile>> {
        let row = sqlx::query(
            r#"
            DELETE FROM media_files
            WHERE id = ?
            RETURNING id, filename, stored_name AS path, mime_type, size_bytes, created_at
            "#,
        )
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(media_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::types::truncate_to_secs;
    use chrono::{Duration, Utc};

    fn media(name: &str, at: chrono::DateTime<Utc>) -> MediaFile {
        MediaFile {
            id: uuid::Uuid::new_v4().to_string(),
            filename: name.to_string(),
            path: format!("/media/{}", name),
            mime_type: "image/png".to_string(),
            size_bytes: 42,
            created_at: truncate_to_secs(at),
        }
    }

    #[tokio::test]
    async fn test_media_rows() {
        let (db, _temp_dir) = test_db().await;
        let now = Utc::now();
        let old = media("old.png", now - Duration::hours(1));
        let new = media("new.png", now);
        db.insert_media(&old).await.unwrap();
        db.insert_media(&new).await.unwrap();

        assert_eq!(db.get_media(&old.id).await.unwrap(), Some(old.clone()));

        let names: Vec<String> = db
            .list_media()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.filename)
            .collect();
        assert_eq!(names, vec!["new.png", "old.png"]);

        assert_eq!(db.delete_media(&old.id).await.unwrap(), Some(old.clone()));
        assert_eq!(db.delete_media(&old.id).await.unwrap(), None);
        assert_eq!(db.list_media().await.unwrap().len(), 1);
    }
}

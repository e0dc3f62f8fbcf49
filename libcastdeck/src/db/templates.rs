use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeMap;

use super::{corrupt, from_ts, Database};
use crate::error::Result;
use crate::types::ContentTemplate;

const TABLE: &str = "content_templates";

fn template_from_row(row: &SqliteRow) -> Result<ContentTemplate> {
    let variables_json: String = row.try_get("variables")?;
    let variables: BTreeMap<String, String> = serde_json::from_str(&variables_json)
        .map_err(|e| corrupt(TABLE, format!("variables is not a JSON object: {}", e)))?;

    Ok(ContentTemplate {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        content: row.try_get("content")?,
        variables,
        created_at: from_ts(TABLE, row.try_get("created_at")?)?,
    })
}

impl Database {
    pub async fn insert_template(&self, template: &ContentTemplate) -> Result<()> {
        let variables_json = serde_json::to_string(&template.variables)
            .map_err(|e| corrupt(TABLE, format!("variables not serializable: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO content_templates (id, name, content, variables, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(&template.content)
        .bind(variables_json)
        .bind(template.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_template(&self, template_id: &str) -> Result<Option<ContentTemplate>> {
        let row = sqlx::query(
            "SELECT id, name, content, variables, created_at FROM content_templates WHERE id = ?",
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(template_from_row).transpose()
    }

    /// All templates in creation order
    pub async fn list_templates(&self) -> Result<Vec<ContentTemplate>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, content, variables, created_at
            FROM content_templates
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(template_from_row).collect()
    }

    /// Returns true if a template was removed
    pub async fn delete_template(&self, template_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM content_templates WHERE id = ?")
            .bind(template_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

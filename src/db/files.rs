use crate::db::models::{LocalFile, LocalFileSummary};
use crate::db::sqlite::LocalStore;
use crate::error::DeskError;
use chrono::Utc;

impl LocalStore {
    pub async fn list_local_files(&self) -> Result<Vec<LocalFileSummary>, DeskError> {
        let rows = sqlx::query_as::<_, LocalFileSummary>(
            r#"SELECT id, name, mime_type, size_bytes, updated_at
               FROM local_files WHERE user_id = ? ORDER BY updated_at DESC, id DESC"#,
        )
        .bind(self.user_id())
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn get_local_file(&self, id: i64) -> Result<LocalFile, DeskError> {
        sqlx::query_as::<_, LocalFile>(
            r#"SELECT id, name, mime_type, content, size_bytes, created_at, updated_at
               FROM local_files WHERE id = ? AND user_id = ?"#,
        )
        .bind(id)
        .bind(self.user_id())
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DeskError::NotFound(format!("local file {id}")))
    }

    pub async fn create_local_file(
        &self,
        name: &str,
        mime_type: &str,
        content: &str,
    ) -> Result<LocalFile, DeskError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"INSERT INTO local_files
               (user_id, name, mime_type, content, size_bytes, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(self.user_id())
        .bind(name)
        .bind(mime_type)
        .bind(content)
        .bind(content.len() as i64)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;
        self.get_local_file(result.last_insert_rowid()).await
    }

    /// Rename and/or replace content. `size_bytes` follows the content.
    pub async fn update_local_file(
        &self,
        id: i64,
        name: Option<&str>,
        mime_type: Option<&str>,
        content: Option<&str>,
    ) -> Result<LocalFile, DeskError> {
        let result = sqlx::query(
            r#"UPDATE local_files SET
                name = COALESCE(?, name),
                mime_type = COALESCE(?, mime_type),
                content = COALESCE(?, content),
                size_bytes = COALESCE(?, size_bytes),
                updated_at = ?
              WHERE id = ? AND user_id = ?"#,
        )
        .bind(name)
        .bind(mime_type)
        .bind(content)
        .bind(content.map(|c| c.len() as i64))
        .bind(Utc::now())
        .bind(id)
        .bind(self.user_id())
        .execute(self.pool())
        .await?;
        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound(format!("local file {id}")));
        }
        self.get_local_file(id).await
    }

    pub async fn delete_local_file(&self, id: i64) -> Result<(), DeskError> {
        let result = sqlx::query("DELETE FROM local_files WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(self.user_id())
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound(format!("local file {id}")));
        }
        Ok(())
    }
}

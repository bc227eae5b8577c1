use crate::db::models::{NodeHistoryEntry, NodeVisit};
use crate::db::sqlite::LocalStore;
use crate::error::DeskError;
use chrono::Utc;

impl LocalStore {
    /// Most recently accessed nodes first.
    pub async fn list_node_history(
        &self,
        server_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<NodeHistoryEntry>, DeskError> {
        let rows = sqlx::query_as::<_, NodeHistoryEntry>(
            r#"SELECT id, server_id, node_id, node_name, node_type, path, access_count, accessed_at
               FROM node_history
               WHERE user_id = ? AND (? IS NULL OR server_id = ?)
               ORDER BY accessed_at DESC, id DESC
               LIMIT ?"#,
        )
        .bind(self.user_id())
        .bind(server_id)
        .bind(server_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Upsert on (server, node): bumps `access_count` and refreshes metadata.
    pub async fn record_node_visit(&self, visit: NodeVisit) -> Result<NodeHistoryEntry, DeskError> {
        let entry = sqlx::query_as::<_, NodeHistoryEntry>(
            r#"INSERT INTO node_history
               (user_id, server_id, node_id, node_name, node_type, path, access_count, accessed_at)
               VALUES (?, ?, ?, ?, ?, ?, 1, ?)
               ON CONFLICT(user_id, server_id, node_id) DO UPDATE SET
                   node_name = excluded.node_name,
                   node_type = COALESCE(excluded.node_type, node_history.node_type),
                   path = COALESCE(excluded.path, node_history.path),
                   access_count = node_history.access_count + 1,
                   accessed_at = excluded.accessed_at
               RETURNING id, server_id, node_id, node_name, node_type, path, access_count, accessed_at"#,
        )
        .bind(self.user_id())
        .bind(visit.server_id)
        .bind(visit.node_id)
        .bind(visit.node_name)
        .bind(visit.node_type)
        .bind(visit.path)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;
        Ok(entry)
    }

    pub async fn clear_node_history(&self, server_id: Option<i64>) -> Result<u64, DeskError> {
        let result = sqlx::query(
            "DELETE FROM node_history WHERE user_id = ? AND (? IS NULL OR server_id = ?)",
        )
        .bind(self.user_id())
        .bind(server_id)
        .bind(server_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}

use crate::db::models::{
    NewSavedSearch, SavedSearch, SavedSearchUpdate, SearchHistoryEntry,
};
use crate::db::sqlite::LocalStore;
use crate::error::DeskError;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

/// Oldest entries beyond this many per server are pruned on insert.
pub const SEARCH_HISTORY_LIMIT: i64 = 100;

impl LocalStore {
    pub async fn list_saved_searches(
        &self,
        server_id: Option<i64>,
    ) -> Result<Vec<SavedSearch>, DeskError> {
        let rows = sqlx::query(
            r#"SELECT id, server_id, name, query, columns, is_default, created_at, updated_at
               FROM saved_searches
               WHERE user_id = ? AND (? IS NULL OR server_id = ?)
               ORDER BY is_default DESC, name"#,
        )
        .bind(self.user_id())
        .bind(server_id)
        .bind(server_id)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(row_to_saved_search).collect()
    }

    pub async fn get_saved_search(&self, id: i64) -> Result<SavedSearch, DeskError> {
        let row = sqlx::query(
            r#"SELECT id, server_id, name, query, columns, is_default, created_at, updated_at
               FROM saved_searches WHERE id = ? AND user_id = ?"#,
        )
        .bind(id)
        .bind(self.user_id())
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DeskError::NotFound(format!("saved search {id}")))?;
        row_to_saved_search(row)
    }

    /// Insert a saved search. Only one search per server can be the default.
    pub async fn create_saved_search(&self, new: NewSavedSearch) -> Result<SavedSearch, DeskError> {
        let columns = new.columns.as_ref().map(serde_json::to_string).transpose()?;
        let now = Utc::now();
        let mut tx = self.pool().begin().await?;
        if new.is_default {
            sqlx::query("UPDATE saved_searches SET is_default = 0 WHERE server_id = ? AND user_id = ?")
                .bind(new.server_id)
                .bind(self.user_id())
                .execute(&mut *tx)
                .await?;
        }
        let result = sqlx::query(
            r#"INSERT INTO saved_searches
               (user_id, server_id, name, query, columns, is_default, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(self.user_id())
        .bind(new.server_id)
        .bind(new.name)
        .bind(new.query)
        .bind(columns)
        .bind(new.is_default)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        self.get_saved_search(result.last_insert_rowid()).await
    }

    pub async fn update_saved_search(
        &self,
        update: SavedSearchUpdate,
    ) -> Result<SavedSearch, DeskError> {
        let existing = self.get_saved_search(update.id).await?;
        let columns = update
            .columns
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let mut tx = self.pool().begin().await?;
        if update.is_default == Some(true) {
            sqlx::query("UPDATE saved_searches SET is_default = 0 WHERE server_id = ? AND user_id = ?")
                .bind(existing.server_id)
                .bind(self.user_id())
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(
            r#"UPDATE saved_searches SET
                name = COALESCE(?, name),
                query = COALESCE(?, query),
                columns = COALESCE(?, columns),
                is_default = COALESCE(?, is_default),
                updated_at = ?
              WHERE id = ? AND user_id = ?"#,
        )
        .bind(update.name)
        .bind(update.query)
        .bind(columns)
        .bind(update.is_default)
        .bind(Utc::now())
        .bind(update.id)
        .bind(self.user_id())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        self.get_saved_search(update.id).await
    }

    pub async fn delete_saved_search(&self, id: i64) -> Result<(), DeskError> {
        let result = sqlx::query("DELETE FROM saved_searches WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(self.user_id())
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound(format!("saved search {id}")));
        }
        Ok(())
    }

    pub async fn list_search_history(
        &self,
        server_id: i64,
        limit: i64,
    ) -> Result<Vec<SearchHistoryEntry>, DeskError> {
        let rows = sqlx::query_as::<_, SearchHistoryEntry>(
            r#"SELECT id, server_id, query, results_count, searched_at
               FROM search_history
               WHERE user_id = ? AND server_id = ?
               ORDER BY searched_at DESC, id DESC
               LIMIT ?"#,
        )
        .bind(self.user_id())
        .bind(server_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Record a search. Repeating the latest query only refreshes its
    /// timestamp and count.
    pub async fn add_search_history(
        &self,
        server_id: i64,
        query: &str,
        results_count: Option<i64>,
    ) -> Result<SearchHistoryEntry, DeskError> {
        let now = Utc::now();
        let mut tx = self.pool().begin().await?;
        let latest: Option<(i64, String)> = sqlx::query_as(
            r#"SELECT id, query FROM search_history
               WHERE user_id = ? AND server_id = ?
               ORDER BY searched_at DESC, id DESC LIMIT 1"#,
        )
        .bind(self.user_id())
        .bind(server_id)
        .fetch_optional(&mut *tx)
        .await?;

        let id = match latest {
            Some((id, last)) if last == query => {
                sqlx::query("UPDATE search_history SET searched_at = ?, results_count = ? WHERE id = ?")
                    .bind(now)
                    .bind(results_count)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                id
            }
            _ => sqlx::query(
                r#"INSERT INTO search_history (user_id, server_id, query, results_count, searched_at)
                   VALUES (?, ?, ?, ?, ?)"#,
            )
            .bind(self.user_id())
            .bind(server_id)
            .bind(query)
            .bind(results_count)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid(),
        };

        sqlx::query(
            r#"DELETE FROM search_history
               WHERE user_id = ? AND server_id = ? AND id NOT IN (
                   SELECT id FROM search_history WHERE user_id = ? AND server_id = ?
                   ORDER BY searched_at DESC, id DESC LIMIT ?
               )"#,
        )
        .bind(self.user_id())
        .bind(server_id)
        .bind(self.user_id())
        .bind(server_id)
        .bind(SEARCH_HISTORY_LIMIT)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let entry = sqlx::query_as::<_, SearchHistoryEntry>(
            "SELECT id, server_id, query, results_count, searched_at FROM search_history WHERE id = ?",
        )
        .bind(id)
        .fetch_one(self.pool())
        .await?;
        Ok(entry)
    }

    pub async fn delete_search_history(&self, id: i64) -> Result<(), DeskError> {
        let result = sqlx::query("DELETE FROM search_history WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(self.user_id())
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound(format!("search history entry {id}")));
        }
        Ok(())
    }

    /// Clear history for one server, or for all servers. Returns rows removed.
    pub async fn clear_search_history(&self, server_id: Option<i64>) -> Result<u64, DeskError> {
        let result = sqlx::query(
            "DELETE FROM search_history WHERE user_id = ? AND (? IS NULL OR server_id = ?)",
        )
        .bind(self.user_id())
        .bind(server_id)
        .bind(server_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_saved_search(row: SqliteRow) -> Result<SavedSearch, DeskError> {
    let columns_json: Option<String> = row.try_get("columns")?;
    let columns: Option<Vec<String>> = match columns_json {
        Some(s) => Some(serde_json::from_str(&s).map_err(|e| sqlx::Error::Decode(Box::new(e)))?),
        None => None,
    };
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(SavedSearch {
        id: row.try_get("id")?,
        server_id: row.try_get("server_id")?,
        name: row.try_get("name")?,
        query: row.try_get("query")?,
        columns,
        is_default: row.try_get("is_default")?,
        created_at,
        updated_at,
    })
}

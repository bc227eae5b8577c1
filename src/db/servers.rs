use crate::db::models::{NewServer, ServerRecord, ServerTokens, ServerUpdate};
use crate::db::sqlite::LocalStore;
use crate::error::DeskError;
use chrono::Utc;

const SERVER_COLUMNS: &str = r#"id, user_id, name, base_url, server_type, auth_type, username,
    token, refresh_token, token_expires_at, oidc_host, oidc_realm, oidc_client_id,
    color, label, display_order, created_at, updated_at"#;

impl LocalStore {
    pub async fn list_servers(&self) -> Result<Vec<ServerRecord>, DeskError> {
        let rows = sqlx::query_as::<_, ServerRecord>(&format!(
            "SELECT {SERVER_COLUMNS} FROM servers WHERE user_id = ? ORDER BY display_order, id"
        ))
        .bind(self.user_id())
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn get_server(&self, id: i64) -> Result<ServerRecord, DeskError> {
        sqlx::query_as::<_, ServerRecord>(&format!(
            "SELECT {SERVER_COLUMNS} FROM servers WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(self.user_id())
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DeskError::NotFound(format!("server {id}")))
    }

    /// Insert a server at the end of the display order. Returns the new row.
    pub async fn create_server(&self, new: NewServer) -> Result<ServerRecord, DeskError> {
        let now = Utc::now();
        let mut tx = self.pool().begin().await?;
        let (next_order,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(display_order) + 1, 0) FROM servers WHERE user_id = ?",
        )
        .bind(self.user_id())
        .fetch_one(&mut *tx)
        .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO servers (
                user_id, name, base_url, server_type, auth_type, username, token,
                oidc_host, oidc_realm, oidc_client_id, color, label,
                display_order, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(self.user_id())
        .bind(new.name)
        .bind(normalize_base_url(&new.base_url))
        .bind(new.server_type.unwrap_or_else(|| "alfresco".to_string()))
        .bind(new.auth_type)
        .bind(new.username)
        .bind(new.token)
        .bind(new.oidc_host)
        .bind(new.oidc_realm)
        .bind(new.oidc_client_id)
        .bind(new.color)
        .bind(new.label)
        .bind(next_order)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.get_server(result.last_insert_rowid()).await
    }

    pub async fn update_server(&self, update: ServerUpdate) -> Result<ServerRecord, DeskError> {
        let result = sqlx::query(
            r#"UPDATE servers SET
                name = COALESCE(?, name),
                base_url = COALESCE(?, base_url),
                auth_type = COALESCE(?, auth_type),
                username = COALESCE(?, username),
                token = COALESCE(?, token),
                oidc_host = COALESCE(?, oidc_host),
                oidc_realm = COALESCE(?, oidc_realm),
                oidc_client_id = COALESCE(?, oidc_client_id),
                color = COALESCE(?, color),
                label = COALESCE(?, label),
                updated_at = ?
              WHERE id = ? AND user_id = ?"#,
        )
        .bind(update.name)
        .bind(update.base_url.as_deref().map(normalize_base_url))
        .bind(update.auth_type)
        .bind(update.username)
        .bind(update.token)
        .bind(update.oidc_host)
        .bind(update.oidc_realm)
        .bind(update.oidc_client_id)
        .bind(update.color)
        .bind(update.label)
        .bind(Utc::now())
        .bind(update.id)
        .bind(self.user_id())
        .execute(self.pool())
        .await?;
        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound(format!("server {}", update.id)));
        }
        self.get_server(update.id).await
    }

    /// Store tokens obtained from a login or a refresh.
    pub async fn store_server_tokens(&self, id: i64, tokens: ServerTokens) -> Result<(), DeskError> {
        let result = sqlx::query(
            r#"UPDATE servers SET
                username = COALESCE(?, username),
                token = ?,
                refresh_token = COALESCE(?, refresh_token),
                token_expires_at = ?,
                updated_at = ?
              WHERE id = ? AND user_id = ?"#,
        )
        .bind(tokens.username)
        .bind(tokens.token)
        .bind(tokens.refresh_token)
        .bind(tokens.expires_at)
        .bind(Utc::now())
        .bind(id)
        .bind(self.user_id())
        .execute(self.pool())
        .await?;
        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound(format!("server {id}")));
        }
        Ok(())
    }

    /// Drop stored credentials, e.g. on logout.
    pub async fn clear_server_tokens(&self, id: i64) -> Result<(), DeskError> {
        sqlx::query(
            r#"UPDATE servers SET token = NULL, refresh_token = NULL, token_expires_at = NULL,
               updated_at = ? WHERE id = ? AND user_id = ?"#,
        )
        .bind(Utc::now())
        .bind(id)
        .bind(self.user_id())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Delete a server; saved searches and histories go with it.
    pub async fn delete_server(&self, id: i64) -> Result<(), DeskError> {
        let result = sqlx::query("DELETE FROM servers WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(self.user_id())
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound(format!("server {id}")));
        }
        Ok(())
    }

    /// Rewrite display order to follow `ids`. Servers not listed keep their
    /// relative order after the listed ones.
    pub async fn reorder_servers(&self, ids: &[i64]) -> Result<Vec<ServerRecord>, DeskError> {
        let current = self.list_servers().await?;
        for id in ids {
            if !current.iter().any(|s| s.id == *id) {
                return Err(DeskError::NotFound(format!("server {id}")));
            }
        }
        let ordered = ids.iter().copied().chain(
            current
                .iter()
                .map(|s| s.id)
                .filter(|id| !ids.contains(id)),
        );

        let mut tx = self.pool().begin().await?;
        for (position, id) in ordered.enumerate() {
            sqlx::query("UPDATE servers SET display_order = ? WHERE id = ? AND user_id = ?")
                .bind(position as i64)
                .bind(id)
                .bind(self.user_id())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        self.list_servers().await
    }
}

/// Trailing slashes would otherwise defeat the uniqueness constraint.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

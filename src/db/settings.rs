use crate::db::models::{AiSettings, AiSettingsInput};
use crate::db::sqlite::LocalStore;
use crate::error::DeskError;
use chrono::Utc;

impl LocalStore {
    pub async fn get_ai_settings(&self) -> Result<Option<AiSettings>, DeskError> {
        let row = sqlx::query_as::<_, AiSettings>(
            r#"SELECT provider, model, base_url, api_key, enabled, updated_at
               FROM ai_settings WHERE user_id = ?"#,
        )
        .bind(self.user_id())
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn save_ai_settings(&self, input: AiSettingsInput) -> Result<AiSettings, DeskError> {
        let settings = sqlx::query_as::<_, AiSettings>(
            r#"INSERT INTO ai_settings (user_id, provider, model, base_url, api_key, enabled, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(user_id) DO UPDATE SET
                   provider = excluded.provider,
                   model = excluded.model,
                   base_url = excluded.base_url,
                   api_key = COALESCE(excluded.api_key, ai_settings.api_key),
                   enabled = excluded.enabled,
                   updated_at = excluded.updated_at
               RETURNING provider, model, base_url, api_key, enabled, updated_at"#,
        )
        .bind(self.user_id())
        .bind(input.provider)
        .bind(input.model)
        .bind(input.base_url)
        .bind(input.api_key)
        .bind(input.enabled)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;
        Ok(settings)
    }
}

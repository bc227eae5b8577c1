use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    Basic,
    OpenidConnect,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Full server row, secrets included. Never serialized to callers.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ServerRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub base_url: String,
    pub server_type: String,
    pub auth_type: AuthType,
    pub username: Option<String>,
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub oidc_host: Option<String>,
    pub oidc_realm: Option<String>,
    pub oidc_client_id: Option<String>,
    pub color: Option<String>,
    pub label: Option<String>,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What callers see of a server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerView {
    pub id: i64,
    pub name: String,
    pub base_url: String,
    pub server_type: String,
    pub auth_type: AuthType,
    pub username: Option<String>,
    pub has_credentials: bool,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub oidc_host: Option<String>,
    pub oidc_realm: Option<String>,
    pub oidc_client_id: Option<String>,
    pub color: Option<String>,
    pub label: Option<String>,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ServerRecord> for ServerView {
    fn from(r: ServerRecord) -> Self {
        Self {
            id: r.id,
            has_credentials: r.token.as_deref().is_some_and(|t| !t.is_empty()),
            name: r.name,
            base_url: r.base_url,
            server_type: r.server_type,
            auth_type: r.auth_type,
            username: r.username,
            token_expires_at: r.token_expires_at,
            oidc_host: r.oidc_host,
            oidc_realm: r.oidc_realm,
            oidc_client_id: r.oidc_client_id,
            color: r.color,
            label: r.label,
            display_order: r.display_order,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewServer {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub server_type: Option<String>,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub oidc_host: Option<String>,
    #[serde(default)]
    pub oidc_realm: Option<String>,
    #[serde(default)]
    pub oidc_client_id: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerUpdate {
    pub id: i64,
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub auth_type: Option<AuthType>,
    pub username: Option<String>,
    pub token: Option<String>,
    pub oidc_host: Option<String>,
    pub oidc_realm: Option<String>,
    pub oidc_client_id: Option<String>,
    pub color: Option<String>,
    pub label: Option<String>,
}

/// Token material written after a login or refresh.
#[derive(Debug, Clone, Default)]
pub struct ServerTokens {
    pub username: Option<String>,
    pub token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    pub id: i64,
    pub server_id: i64,
    pub name: String,
    pub query: String,
    pub columns: Option<Vec<String>>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSavedSearch {
    pub server_id: i64,
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearchUpdate {
    pub id: i64,
    pub name: Option<String>,
    pub query: Option<String>,
    pub columns: Option<Vec<String>>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistoryEntry {
    pub id: i64,
    pub server_id: i64,
    pub query: String,
    pub results_count: Option<i64>,
    pub searched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LocalFile {
    pub id: i64,
    pub name: String,
    pub mime_type: String,
    pub content: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing entry without the file body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LocalFileSummary {
    pub id: i64,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NodeHistoryEntry {
    pub id: i64,
    pub server_id: i64,
    pub node_id: String,
    pub node_name: String,
    pub node_type: Option<String>,
    pub path: Option<String>,
    pub access_count: i64,
    pub accessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeVisit {
    pub server_id: i64,
    pub node_id: String,
    pub node_name: String,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSettingsInput {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

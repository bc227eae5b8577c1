//! `backend.*` methods: local application data.

use crate::alfresco::endpoints::parse_base_url;
use crate::db::models::{
    AiSettings, AiSettingsInput, AuthType, LocalFile, LocalFileSummary, NewSavedSearch,
    NewServer, NodeHistoryEntry, NodeVisit, SavedSearch, SavedSearchUpdate, SearchHistoryEntry,
    ServerUpdate, ServerView, User,
};
use crate::error::DeskError;
use crate::router::DeskState;
use crate::rpc::registry::MethodRegistry;
use crate::service::query_builder::{self, BuiltQuery, QueryRequest};
use crate::types::{Empty, node_id};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 500;

pub fn register_backend_methods(registry: &mut MethodRegistry) {
    registry.register("backend.user.get", user_get);

    registry.register("backend.servers.list", servers_list);
    registry.register("backend.servers.get", servers_get);
    registry.register("backend.servers.create", servers_create);
    registry.register("backend.servers.update", servers_update);
    registry.register("backend.servers.delete", servers_delete);
    registry.register("backend.servers.reorder", servers_reorder);

    registry.register("backend.savedSearches.list", saved_searches_list);
    registry.register("backend.savedSearches.create", saved_searches_create);
    registry.register("backend.savedSearches.update", saved_searches_update);
    registry.register("backend.savedSearches.delete", saved_searches_delete);

    registry.register("backend.searchHistory.list", search_history_list);
    registry.register("backend.searchHistory.add", search_history_add);
    registry.register("backend.searchHistory.delete", search_history_delete);
    registry.register("backend.searchHistory.clear", search_history_clear);

    registry.register("backend.localFiles.list", local_files_list);
    registry.register("backend.localFiles.get", local_files_get);
    registry.register("backend.localFiles.create", local_files_create);
    registry.register("backend.localFiles.update", local_files_update);
    registry.register("backend.localFiles.delete", local_files_delete);

    registry.register("backend.nodeHistory.list", node_history_list);
    registry.register("backend.nodeHistory.record", node_history_record);
    registry.register("backend.nodeHistory.clear", node_history_clear);

    registry.register("backend.aiSettings.get", ai_settings_get);
    registry.register("backend.aiSettings.save", ai_settings_save);

    registry.register("backend.search.buildQuery", search_build_query);
}

#[derive(Debug, Deserialize)]
pub struct IdParams {
    pub id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerScope {
    #[serde(default)]
    pub server_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryListParams {
    #[serde(default)]
    pub server_id: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistoryListParams {
    pub server_id: i64,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistoryAddParams {
    pub server_id: i64,
    pub query: String,
    #[serde(default)]
    pub results_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderParams {
    pub ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFileCreateParams {
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFileUpdateParams {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Removed {
    pub removed: u64,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: bool,
}

const DELETED: Deleted = Deleted { deleted: true };

fn non_empty(field: &str, value: &str) -> Result<(), DeskError> {
    if value.trim().is_empty() {
        return Err(DeskError::Validation {
            message: format!("{field} must not be empty"),
            details: Some(serde_json::json!({ "field": field })),
        });
    }
    Ok(())
}

fn history_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

async fn user_get(state: DeskState, _: Empty) -> Result<User, DeskError> {
    state.store.user().await
}

async fn servers_list(state: DeskState, _: Empty) -> Result<Vec<ServerView>, DeskError> {
    let servers = state.store.list_servers().await?;
    Ok(servers.into_iter().map(ServerView::from).collect())
}

async fn servers_get(state: DeskState, p: IdParams) -> Result<ServerView, DeskError> {
    Ok(state.store.get_server(p.id).await?.into())
}

fn validate_new_server(new: &NewServer) -> Result<(), DeskError> {
    non_empty("name", &new.name)?;
    parse_base_url(&new.base_url)?;
    if new.auth_type == AuthType::OpenidConnect {
        for (field, value) in [
            ("oidcHost", &new.oidc_host),
            ("oidcRealm", &new.oidc_realm),
            ("oidcClientId", &new.oidc_client_id),
        ] {
            non_empty(field, value.as_deref().unwrap_or_default())?;
        }
        if let Some(host) = new.oidc_host.as_deref() {
            parse_base_url(host)?;
        }
    }
    Ok(())
}

async fn servers_create(state: DeskState, new: NewServer) -> Result<ServerView, DeskError> {
    validate_new_server(&new)?;
    let created = state.store.create_server(new).await?;
    tracing::info!(server_id = created.id, base_url = %created.base_url, "server created");
    Ok(created.into())
}

async fn servers_update(state: DeskState, update: ServerUpdate) -> Result<ServerView, DeskError> {
    if let Some(name) = update.name.as_deref() {
        non_empty("name", name)?;
    }
    if let Some(url) = update.base_url.as_deref() {
        parse_base_url(url)?;
    }
    if let Some(host) = update.oidc_host.as_deref() {
        parse_base_url(host)?;
    }
    Ok(state.store.update_server(update).await?.into())
}

async fn servers_delete(state: DeskState, p: IdParams) -> Result<Deleted, DeskError> {
    state.store.delete_server(p.id).await?;
    tracing::info!(server_id = p.id, "server deleted");
    Ok(DELETED)
}

async fn servers_reorder(state: DeskState, p: ReorderParams) -> Result<Vec<ServerView>, DeskError> {
    let servers = state.store.reorder_servers(&p.ids).await?;
    Ok(servers.into_iter().map(ServerView::from).collect())
}

async fn saved_searches_list(state: DeskState, p: ServerScope) -> Result<Vec<SavedSearch>, DeskError> {
    state.store.list_saved_searches(p.server_id).await
}

async fn saved_searches_create(
    state: DeskState,
    new: NewSavedSearch,
) -> Result<SavedSearch, DeskError> {
    non_empty("name", &new.name)?;
    non_empty("query", &new.query)?;
    state.store.get_server(new.server_id).await?;
    state.store.create_saved_search(new).await
}

async fn saved_searches_update(
    state: DeskState,
    update: SavedSearchUpdate,
) -> Result<SavedSearch, DeskError> {
    if let Some(name) = update.name.as_deref() {
        non_empty("name", name)?;
    }
    if let Some(query) = update.query.as_deref() {
        non_empty("query", query)?;
    }
    state.store.update_saved_search(update).await
}

async fn saved_searches_delete(state: DeskState, p: IdParams) -> Result<Deleted, DeskError> {
    state.store.delete_saved_search(p.id).await?;
    Ok(DELETED)
}

async fn search_history_list(
    state: DeskState,
    p: SearchHistoryListParams,
) -> Result<Vec<SearchHistoryEntry>, DeskError> {
    state
        .store
        .list_search_history(p.server_id, history_limit(p.limit))
        .await
}

async fn search_history_add(
    state: DeskState,
    p: SearchHistoryAddParams,
) -> Result<SearchHistoryEntry, DeskError> {
    non_empty("query", &p.query)?;
    state.store.get_server(p.server_id).await?;
    state
        .store
        .add_search_history(p.server_id, p.query.trim(), p.results_count)
        .await
}

async fn search_history_delete(state: DeskState, p: IdParams) -> Result<Deleted, DeskError> {
    state.store.delete_search_history(p.id).await?;
    Ok(DELETED)
}

async fn search_history_clear(state: DeskState, p: ServerScope) -> Result<Removed, DeskError> {
    let removed = state.store.clear_search_history(p.server_id).await?;
    Ok(Removed { removed })
}

async fn local_files_list(state: DeskState, _: Empty) -> Result<Vec<LocalFileSummary>, DeskError> {
    state.store.list_local_files().await
}

async fn local_files_get(state: DeskState, p: IdParams) -> Result<LocalFile, DeskError> {
    state.store.get_local_file(p.id).await
}

async fn local_files_create(
    state: DeskState,
    p: LocalFileCreateParams,
) -> Result<LocalFile, DeskError> {
    non_empty("name", &p.name)?;
    let mime_type = p.mime_type.as_deref().unwrap_or("text/plain");
    state
        .store
        .create_local_file(p.name.trim(), mime_type, &p.content)
        .await
}

async fn local_files_update(
    state: DeskState,
    p: LocalFileUpdateParams,
) -> Result<LocalFile, DeskError> {
    if let Some(name) = p.name.as_deref() {
        non_empty("name", name)?;
    }
    state
        .store
        .update_local_file(
            p.id,
            p.name.as_deref().map(str::trim),
            p.mime_type.as_deref(),
            p.content.as_deref(),
        )
        .await
}

async fn local_files_delete(state: DeskState, p: IdParams) -> Result<Deleted, DeskError> {
    state.store.delete_local_file(p.id).await?;
    Ok(DELETED)
}

async fn node_history_list(
    state: DeskState,
    p: HistoryListParams,
) -> Result<Vec<NodeHistoryEntry>, DeskError> {
    state
        .store
        .list_node_history(p.server_id, history_limit(p.limit))
        .await
}

async fn node_history_record(
    state: DeskState,
    mut visit: NodeVisit,
) -> Result<NodeHistoryEntry, DeskError> {
    visit.node_id = node_id(&visit.node_id)?;
    non_empty("nodeName", &visit.node_name)?;
    state.store.get_server(visit.server_id).await?;
    state.store.record_node_visit(visit).await
}

async fn node_history_clear(state: DeskState, p: ServerScope) -> Result<Removed, DeskError> {
    let removed = state.store.clear_node_history(p.server_id).await?;
    Ok(Removed { removed })
}

async fn ai_settings_get(state: DeskState, _: Empty) -> Result<Option<AiSettings>, DeskError> {
    state.store.get_ai_settings().await
}

async fn ai_settings_save(state: DeskState, input: AiSettingsInput) -> Result<AiSettings, DeskError> {
    non_empty("provider", &input.provider)?;
    non_empty("model", &input.model)?;
    if let Some(url) = input.base_url.as_deref().filter(|u| !u.is_empty()) {
        parse_base_url(url)?;
    }
    state.store.save_ai_settings(input).await
}

async fn search_build_query(_: DeskState, request: QueryRequest) -> Result<BuiltQuery, DeskError> {
    query_builder::build(&request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oidc_servers_need_realm_settings() {
        let mut new = NewServer {
            name: "sso".into(),
            base_url: "https://ecm.example.com".into(),
            auth_type: AuthType::OpenidConnect,
            oidc_host: Some("https://sso.example.com".into()),
            ..Default::default()
        };
        assert!(validate_new_server(&new).is_err());
        new.oidc_realm = Some("alfresco".into());
        new.oidc_client_id = Some("desk".into());
        assert!(validate_new_server(&new).is_ok());
    }

    #[test]
    fn history_limit_is_clamped() {
        assert_eq!(history_limit(None), DEFAULT_HISTORY_LIMIT);
        assert_eq!(history_limit(Some(0)), 1);
        assert_eq!(history_limit(Some(10_000)), MAX_HISTORY_LIMIT);
    }
}

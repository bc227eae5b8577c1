use crate::db::models::{
    LocalFile, LocalFileSummary, NewSavedSearch, NewServer, NodeHistoryEntry, NodeVisit,
    SavedSearch, SearchHistoryEntry, ServerUpdate, ServerView, User,
};
use crate::error::{ApiErrorBody, DeskError, ErrorCode};
use crate::service::query_builder::{BuiltQuery, QueryRequest};
use crate::types::{Empty, HealthResponse, RpcRequest};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed caller for a running backend's `/rpc` endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(base: Url) -> Self {
        Self::with_http(reqwest::Client::new(), base)
    }

    pub fn with_http(http: reqwest::Client, base: Url) -> Self {
        Self {
            http,
            base,
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub async fn health(&self) -> Result<HealthResponse, DeskError> {
        let url = self.base.join("health")?;
        let fut = async move {
            let resp = self.http.get(url).send().await?;
            Self::decode(resp).await
        };
        self.bounded("health", fut).await
    }

    /// Call a method and decode its result.
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, DeskError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.base.join("rpc")?;
        let envelope = RpcRequest {
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        };
        debug!(method, "rpc call");
        let fut = async move {
            let resp = self.http.post(url).json(&envelope).send().await?;
            Self::decode(resp).await
        };
        self.bounded(method, fut).await
    }

    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, DeskError>>,
    ) -> Result<T, DeskError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DeskError::Timeout(format!(
                "{what} did not answer within {:?}",
                self.timeout
            ))),
        }
    }

    async fn decode<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, DeskError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if status.is_success() {
            return Ok(serde_json::from_slice(&bytes)?);
        }
        match serde_json::from_slice::<ApiErrorBody>(&bytes) {
            Ok(body) => Err(body.into()),
            Err(_) => Err(DeskError::Remote {
                code: ErrorCode::from_status(status),
                message: String::from_utf8_lossy(&bytes).trim().to_string(),
                details: None,
            }),
        }
    }

    pub async fn user(&self) -> Result<User, DeskError> {
        self.call("backend.user.get", &Empty {}).await
    }

    pub async fn list_servers(&self) -> Result<Vec<ServerView>, DeskError> {
        self.call("backend.servers.list", &Empty {}).await
    }

    pub async fn create_server(&self, new: &NewServer) -> Result<ServerView, DeskError> {
        self.call("backend.servers.create", new).await
    }

    pub async fn update_server(&self, update: &ServerUpdate) -> Result<ServerView, DeskError> {
        self.call("backend.servers.update", update).await
    }

    pub async fn delete_server(&self, id: i64) -> Result<(), DeskError> {
        let _: Value = self.call("backend.servers.delete", &json!({ "id": id })).await?;
        Ok(())
    }

    pub async fn list_saved_searches(
        &self,
        server_id: Option<i64>,
    ) -> Result<Vec<SavedSearch>, DeskError> {
        self.call("backend.savedSearches.list", &json!({ "serverId": server_id }))
            .await
    }

    pub async fn create_saved_search(&self, new: &NewSavedSearch) -> Result<SavedSearch, DeskError> {
        self.call("backend.savedSearches.create", new).await
    }

    pub async fn add_search_history(
        &self,
        server_id: i64,
        query: &str,
        results_count: Option<i64>,
    ) -> Result<SearchHistoryEntry, DeskError> {
        self.call(
            "backend.searchHistory.add",
            &json!({ "serverId": server_id, "query": query, "resultsCount": results_count }),
        )
        .await
    }

    pub async fn list_local_files(&self) -> Result<Vec<LocalFileSummary>, DeskError> {
        self.call("backend.localFiles.list", &Empty {}).await
    }

    pub async fn create_local_file(
        &self,
        name: &str,
        mime_type: Option<&str>,
        content: &str,
    ) -> Result<LocalFile, DeskError> {
        self.call(
            "backend.localFiles.create",
            &json!({ "name": name, "mimeType": mime_type, "content": content }),
        )
        .await
    }

    pub async fn record_node_visit(&self, visit: &NodeVisit) -> Result<NodeHistoryEntry, DeskError> {
        self.call("backend.nodeHistory.record", visit).await
    }

    pub async fn build_query(&self, request: &QueryRequest) -> Result<BuiltQuery, DeskError> {
        self.call("backend.search.buildQuery", request).await
    }

    /// `alfresco.<op>` against a stored server; `args` must be an object.
    pub async fn alfresco(&self, op: &str, server_id: i64, args: Value) -> Result<Value, DeskError> {
        let mut params = match args {
            Value::Object(map) => map,
            Value::Null => Default::default(),
            _ => return Err(DeskError::validation("alfresco args must be an object")),
        };
        params.insert("serverId".to_string(), json!(server_id));
        self.call(&format!("alfresco.{op}"), &params).await
    }
}

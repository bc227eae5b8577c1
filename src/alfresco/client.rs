use crate::alfresco::auth::Credentials;
use crate::alfresco::endpoints::{Api, api_url, parse_base_url};
use crate::error::{AlfrescoError, DeskError};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// One authenticated view of a remote repository. Built per call.
#[derive(Debug, Clone)]
pub struct AlfrescoClient {
    http: reqwest::Client,
    base: Url,
    credentials: Credentials,
}

impl AlfrescoClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        credentials: Credentials,
    ) -> Result<Self, DeskError> {
        Ok(Self {
            http,
            base: parse_base_url(base_url)?,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Use a different HTTP client, e.g. one without a total timeout for
    /// long downloads.
    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn request(&self, method: Method, api: Api, path: &str) -> Result<RequestBuilder, DeskError> {
        let url = api_url(&self.base, api, path)?;
        debug!(%method, %url, "alfresco request");
        let req = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        Ok(self.credentials.apply(req))
    }

    /// Send and map non-success statuses to `DeskError::Upstream`.
    pub async fn send(&self, req: RequestBuilder) -> Result<Response, DeskError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.bytes().await.unwrap_or_default();
        Err(AlfrescoError::into_desk_error(&body, status))
    }

    /// Send and decode a JSON body. Empty responses become `null`.
    pub async fn json(&self, req: RequestBuilder) -> Result<Value, DeskError> {
        let resp = self.send(req).await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Query-string accumulator that skips absent values.
#[derive(Debug, Default)]
pub struct QueryParams(Vec<(&'static str, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opt<T: ToString>(mut self, key: &'static str, value: Option<T>) -> Self {
        if let Some(v) = value {
            self.0.push((key, v.to_string()));
        }
        self
    }

    /// Comma-joined list, skipped when empty.
    pub fn list(mut self, key: &'static str, values: &[String]) -> Self {
        if !values.is_empty() {
            self.0.push((key, values.join(",")));
        }
        self
    }

    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.0
    }
}

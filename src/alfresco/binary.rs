//! Content transfer: streamed downloads and multipart uploads.

use crate::alfresco::client::{AlfrescoClient, QueryParams};
use crate::alfresco::endpoints::Api;
use crate::error::DeskError;
use crate::types::node_id;
use crate::types::rpc::decode_params;
use axum::body::Bytes;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;

/// `GET /rpc-stream` methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DownloadKind {
    #[serde(rename = "nodes.content")]
    Content,
    #[serde(rename = "nodes.rendition")]
    Rendition,
    #[serde(rename = "nodes.versionContent")]
    VersionContent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub method: DownloadKind,
    pub server_id: i64,
    pub node_id: String,
    #[serde(default)]
    pub rendition_id: Option<String>,
    #[serde(default)]
    pub version_id: Option<String>,
    #[serde(default)]
    pub attachment: bool,
}

impl DownloadRequest {
    fn path(&self) -> Result<String, DeskError> {
        let id = node_id(&self.node_id)?;
        Ok(match self.method {
            DownloadKind::Content => format!("nodes/{id}/content"),
            DownloadKind::Rendition => {
                let rendition = segment("renditionId", self.rendition_id.as_deref())?;
                format!("nodes/{id}/renditions/{rendition}/content")
            }
            DownloadKind::VersionContent => {
                let version = segment("versionId", self.version_id.as_deref())?;
                format!("nodes/{id}/versions/{version}/content")
            }
        })
    }

    pub async fn send(&self, client: &AlfrescoClient) -> Result<reqwest::Response, DeskError> {
        let q = QueryParams::new().opt("attachment", Some(self.attachment));
        let req = client
            .request(Method::GET, Api::Core, &self.path()?)?
            .header(reqwest::header::ACCEPT, "*/*")
            .query(q.pairs());
        client.send(req).await
    }
}

fn segment<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, DeskError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() && !v.contains('/') => Ok(v),
        _ => Err(DeskError::validation(format!("{field} is required"))),
    }
}

/// `POST /rpc-binary` methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Create a new child under `parentId`.
    NewNode,
    /// Replace the content of `nodeId`.
    ReplaceContent,
}

impl UploadKind {
    pub fn name(self) -> &'static str {
        match self {
            UploadKind::NewNode => "alfresco.nodes.upload",
            UploadKind::ReplaceContent => "alfresco.nodes.updateContent",
        }
    }
}

impl FromStr for UploadKind {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [UploadKind::NewNode, UploadKind::ReplaceContent]
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| DeskError::MethodNotFound(s.to_string()))
    }
}

/// The `file` part of an upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewNodeArgs {
    parent_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    node_type: Option<String>,
    #[serde(default)]
    relative_path: Option<String>,
    #[serde(default)]
    auto_rename: Option<bool>,
    #[serde(default)]
    major_version: Option<bool>,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplaceContentArgs {
    node_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    major_version: Option<bool>,
    #[serde(default)]
    comment: Option<String>,
}

impl UploadKind {
    pub async fn execute(
        self,
        client: &AlfrescoClient,
        params: Value,
        file: UploadFile,
    ) -> Result<Value, DeskError> {
        match self {
            UploadKind::NewNode => {
                let a: NewNodeArgs = decode_params(self.name(), params)?;
                let name = a.name.unwrap_or_else(|| file.file_name.clone());
                let mut part = Part::stream_with_length(
                    reqwest::Body::from(file.bytes.clone()),
                    file.bytes.len() as u64,
                )
                .file_name(name.clone());
                if let Some(ct) = file.content_type.as_deref() {
                    part = part.mime_str(ct)?;
                }
                let mut form = Form::new().part("filedata", part).text("name", name);
                if let Some(t) = a.node_type {
                    form = form.text("nodeType", t);
                }
                if let Some(p) = a.relative_path {
                    form = form.text("relativePath", p);
                }
                if let Some(r) = a.auto_rename {
                    form = form.text("autoRename", r.to_string());
                }
                if let Some(m) = a.major_version {
                    form = form.text("majorVersion", m.to_string());
                }
                for (key, value) in a.properties {
                    let text = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    form = form.text(key, text);
                }
                let req = client
                    .request(
                        Method::POST,
                        Api::Core,
                        &format!("nodes/{}/children", node_id(&a.parent_id)?),
                    )?
                    .multipart(form);
                client.json(req).await
            }
            UploadKind::ReplaceContent => {
                let a: ReplaceContentArgs = decode_params(self.name(), params)?;
                let q = QueryParams::new()
                    .opt("majorVersion", a.major_version)
                    .opt("comment", a.comment)
                    .opt("name", a.name);
                let content_type = file
                    .content_type
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let req = client
                    .request(
                        Method::PUT,
                        Api::Core,
                        &format!("nodes/{}/content", node_id(&a.node_id)?),
                    )?
                    .query(q.pairs())
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .body(file.bytes);
                client.json(req).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download(method: DownloadKind) -> DownloadRequest {
        DownloadRequest {
            method,
            server_id: 1,
            node_id: "workspace://SpacesStore/abc".into(),
            rendition_id: None,
            version_id: None,
            attachment: false,
        }
    }

    #[test]
    fn download_paths() {
        assert_eq!(download(DownloadKind::Content).path().unwrap(), "nodes/abc/content");

        let mut r = download(DownloadKind::Rendition);
        assert!(r.path().is_err());
        r.rendition_id = Some("pdf".into());
        assert_eq!(r.path().unwrap(), "nodes/abc/renditions/pdf/content");

        let mut v = download(DownloadKind::VersionContent);
        v.version_id = Some("1.1".into());
        assert_eq!(v.path().unwrap(), "nodes/abc/versions/1.1/content");
    }

    #[test]
    fn upload_methods_parse_by_rpc_name() {
        assert_eq!(
            "alfresco.nodes.upload".parse::<UploadKind>().unwrap(),
            UploadKind::NewNode
        );
        assert!("alfresco.nodes.get".parse::<UploadKind>().is_err());
    }
}

//! The proxied Alfresco operations and their argument shapes.

use crate::alfresco::client::{AlfrescoClient, QueryParams};
use crate::alfresco::endpoints::Api;
use crate::error::DeskError;
use crate::service::query_builder::{Combinator, QueryToken, build_query};
use crate::types::node_id;
use crate::types::rpc::decode_params;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlfrescoMethod {
    Login,
    Logout,
    ValidateTicket,
    GetNode,
    ListChildren,
    CreateNode,
    UpdateNode,
    DeleteNode,
    CopyNode,
    MoveNode,
    GetText,
    SetText,
    ListVersions,
    Search,
    ListSites,
    GetPerson,
    Raw,
}

impl AlfrescoMethod {
    pub const ALL: [AlfrescoMethod; 17] = [
        AlfrescoMethod::Login,
        AlfrescoMethod::Logout,
        AlfrescoMethod::ValidateTicket,
        AlfrescoMethod::GetNode,
        AlfrescoMethod::ListChildren,
        AlfrescoMethod::CreateNode,
        AlfrescoMethod::UpdateNode,
        AlfrescoMethod::DeleteNode,
        AlfrescoMethod::CopyNode,
        AlfrescoMethod::MoveNode,
        AlfrescoMethod::GetText,
        AlfrescoMethod::SetText,
        AlfrescoMethod::ListVersions,
        AlfrescoMethod::Search,
        AlfrescoMethod::ListSites,
        AlfrescoMethod::GetPerson,
        AlfrescoMethod::Raw,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AlfrescoMethod::Login => "auth.login",
            AlfrescoMethod::Logout => "auth.logout",
            AlfrescoMethod::ValidateTicket => "auth.validateTicket",
            AlfrescoMethod::GetNode => "nodes.get",
            AlfrescoMethod::ListChildren => "nodes.children",
            AlfrescoMethod::CreateNode => "nodes.create",
            AlfrescoMethod::UpdateNode => "nodes.update",
            AlfrescoMethod::DeleteNode => "nodes.delete",
            AlfrescoMethod::CopyNode => "nodes.copy",
            AlfrescoMethod::MoveNode => "nodes.move",
            AlfrescoMethod::GetText => "nodes.getText",
            AlfrescoMethod::SetText => "nodes.setText",
            AlfrescoMethod::ListVersions => "nodes.versions",
            AlfrescoMethod::Search => "search.query",
            AlfrescoMethod::ListSites => "sites.list",
            AlfrescoMethod::GetPerson => "people.get",
            AlfrescoMethod::Raw => "request",
        }
    }

    /// Login is the only call made before any credentials exist.
    pub fn needs_credentials(self) -> bool {
        !matches!(self, AlfrescoMethod::Login)
    }

    pub async fn execute(self, client: &AlfrescoClient, args: Value) -> Result<Value, DeskError> {
        let method = self.name();
        match self {
            AlfrescoMethod::Login => {
                let a: LoginArgs = decode_params(method, args)?;
                let req = client
                    .request(Method::POST, Api::Auth, "tickets")?
                    .json(&json!({ "userId": a.username, "password": a.password }));
                let resp = client.json(req).await?;
                let ticket = resp
                    .pointer("/entry/id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| DeskError::Internal("ticket response without entry.id".into()))?;
                Ok(json!({ "ticket": ticket, "userId": a.username }))
            }
            AlfrescoMethod::Logout => {
                let req = client.request(Method::DELETE, Api::Auth, "tickets/-me-")?;
                client.json(req).await
            }
            AlfrescoMethod::ValidateTicket => {
                let req = client.request(Method::GET, Api::Auth, "tickets/-me-")?;
                client.json(req).await
            }
            AlfrescoMethod::GetNode => {
                let a: NodeArgs = decode_params(method, args)?;
                let q = QueryParams::new()
                    .list("include", &a.include)
                    .opt("relativePath", a.relative_path);
                let req = client
                    .request(Method::GET, Api::Core, &format!("nodes/{}", node_id(&a.node_id)?))?
                    .query(q.pairs());
                client.json(req).await
            }
            AlfrescoMethod::ListChildren => {
                let a: ChildrenArgs = decode_params(method, args)?;
                let q = QueryParams::new()
                    .opt("skipCount", a.skip_count)
                    .opt("maxItems", a.max_items)
                    .opt("orderBy", a.order_by)
                    .list("include", &a.include)
                    .opt("where", a.filter)
                    .opt("relativePath", a.relative_path);
                let req = client
                    .request(
                        Method::GET,
                        Api::Core,
                        &format!("nodes/{}/children", node_id(&a.node_id)?),
                    )?
                    .query(q.pairs());
                client.json(req).await
            }
            AlfrescoMethod::CreateNode => {
                let a: CreateNodeArgs = decode_params(method, args)?;
                require("name", &a.name)?;
                let mut body = Map::new();
                body.insert("name".into(), Value::String(a.name));
                body.insert("nodeType".into(), Value::String(a.node_type));
                insert_opt(&mut body, "properties", a.properties);
                insert_opt(&mut body, "aspectNames", a.aspect_names.map(|v| json!(v)));
                insert_opt(&mut body, "relativePath", a.relative_path.map(Value::String));
                let q = QueryParams::new().opt("autoRename", a.auto_rename);
                let req = client
                    .request(
                        Method::POST,
                        Api::Core,
                        &format!("nodes/{}/children", node_id(&a.parent_id)?),
                    )?
                    .query(q.pairs())
                    .json(&Value::Object(body));
                client.json(req).await
            }
            AlfrescoMethod::UpdateNode => {
                let a: UpdateNodeArgs = decode_params(method, args)?;
                let mut body = Map::new();
                insert_opt(&mut body, "name", a.name.map(Value::String));
                insert_opt(&mut body, "nodeType", a.node_type.map(Value::String));
                insert_opt(&mut body, "properties", a.properties);
                insert_opt(&mut body, "aspectNames", a.aspect_names.map(|v| json!(v)));
                if body.is_empty() {
                    return Err(DeskError::validation("nodes.update needs at least one change"));
                }
                let req = client
                    .request(Method::PUT, Api::Core, &format!("nodes/{}", node_id(&a.node_id)?))?
                    .json(&Value::Object(body));
                client.json(req).await
            }
            AlfrescoMethod::DeleteNode => {
                let a: DeleteNodeArgs = decode_params(method, args)?;
                let q = QueryParams::new().opt("permanent", a.permanent);
                let req = client
                    .request(Method::DELETE, Api::Core, &format!("nodes/{}", node_id(&a.node_id)?))?
                    .query(q.pairs());
                client.json(req).await
            }
            AlfrescoMethod::CopyNode | AlfrescoMethod::MoveNode => {
                let a: RelocateArgs = decode_params(method, args)?;
                let action = if self == AlfrescoMethod::CopyNode { "copy" } else { "move" };
                let mut body = Map::new();
                body.insert(
                    "targetParentId".into(),
                    Value::String(node_id(&a.target_parent_id)?),
                );
                insert_opt(&mut body, "name", a.name.map(Value::String));
                let req = client
                    .request(
                        Method::POST,
                        Api::Core,
                        &format!("nodes/{}/{action}", node_id(&a.node_id)?),
                    )?
                    .json(&Value::Object(body));
                client.json(req).await
            }
            AlfrescoMethod::GetText => {
                let a: NodeArgs = decode_params(method, args)?;
                let id = node_id(&a.node_id)?;
                let req = client.request(Method::GET, Api::Core, &format!("nodes/{id}/content"))?;
                let resp = client.send(req).await?;
                let mime_type = resp
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let bytes = resp.bytes().await?;
                Ok(json!({
                    "nodeId": id,
                    "mimeType": mime_type,
                    "content": String::from_utf8_lossy(&bytes),
                }))
            }
            AlfrescoMethod::SetText => {
                let a: SetTextArgs = decode_params(method, args)?;
                let q = QueryParams::new()
                    .opt("majorVersion", a.major_version)
                    .opt("comment", a.comment);
                let mime = a
                    .mime_type
                    .unwrap_or_else(|| "text/plain; charset=utf-8".to_string());
                let req = client
                    .request(
                        Method::PUT,
                        Api::Core,
                        &format!("nodes/{}/content", node_id(&a.node_id)?),
                    )?
                    .query(q.pairs())
                    .header(reqwest::header::CONTENT_TYPE, mime)
                    .body(a.content);
                client.json(req).await
            }
            AlfrescoMethod::ListVersions => {
                let a: PagedNodeArgs = decode_params(method, args)?;
                let q = QueryParams::new()
                    .opt("skipCount", a.skip_count)
                    .opt("maxItems", a.max_items);
                let req = client
                    .request(
                        Method::GET,
                        Api::Core,
                        &format!("nodes/{}/versions", node_id(&a.node_id)?),
                    )?
                    .query(q.pairs());
                client.json(req).await
            }
            AlfrescoMethod::Search => {
                let a: SearchArgs = decode_params(method, args)?;
                let body = a.into_body()?;
                let req = client.request(Method::POST, Api::Search, "search")?.json(&body);
                client.json(req).await
            }
            AlfrescoMethod::ListSites => {
                let a: PagingArgs = decode_params(method, args)?;
                let q = QueryParams::new()
                    .opt("skipCount", a.skip_count)
                    .opt("maxItems", a.max_items);
                let req = client.request(Method::GET, Api::Core, "sites")?.query(q.pairs());
                client.json(req).await
            }
            AlfrescoMethod::GetPerson => {
                let a: PersonArgs = decode_params(method, args)?;
                let person = path_segment("personId", &a.person_id)?;
                let req = client.request(Method::GET, Api::Core, &format!("people/{person}"))?;
                client.json(req).await
            }
            AlfrescoMethod::Raw => {
                let a: RawArgs = decode_params(method, args)?;
                let http_method = Method::from_str(&a.http_method.to_ascii_uppercase())
                    .map_err(|_| DeskError::validation(format!("invalid httpMethod: {}", a.http_method)))?;
                let query: Vec<(String, String)> = a
                    .query
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(k, v)| match v {
                        Value::String(s) => (k, s),
                        other => (k, other.to_string()),
                    })
                    .collect();
                let mut req = client.request(http_method, a.api, &a.path)?.query(&query);
                if let Some(body) = a.body {
                    req = req.json(&body);
                }
                client.json(req).await
            }
        }
    }
}

impl FromStr for AlfrescoMethod {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlfrescoMethod::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| DeskError::MethodNotFound(format!("alfresco.{s}")))
    }
}

fn require(field: &str, value: &str) -> Result<(), DeskError> {
    if value.trim().is_empty() {
        return Err(DeskError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// A value spliced into the URL path must stay a single segment.
fn path_segment<'a>(field: &str, value: &'a str) -> Result<&'a str, DeskError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DeskError::validation(format!("{field} must not be empty")));
    }
    if value.contains(['/', '?', '#', '\\']) {
        return Err(DeskError::validation(format!(
            "{field} must not contain '/', '?' or '#'"
        )));
    }
    Ok(value)
}

fn insert_opt(body: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(v) = value {
        body.insert(key.to_string(), v);
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginArgs {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeArgs {
    node_id: String,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    relative_path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChildrenArgs {
    node_id: String,
    #[serde(default)]
    skip_count: Option<u32>,
    #[serde(default)]
    max_items: Option<u32>,
    #[serde(default)]
    order_by: Option<String>,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default, rename = "where")]
    filter: Option<String>,
    #[serde(default)]
    relative_path: Option<String>,
}

fn default_node_type() -> String {
    "cm:content".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateNodeArgs {
    parent_id: String,
    name: String,
    #[serde(default = "default_node_type")]
    node_type: String,
    #[serde(default)]
    properties: Option<Value>,
    #[serde(default)]
    aspect_names: Option<Vec<String>>,
    #[serde(default)]
    relative_path: Option<String>,
    #[serde(default)]
    auto_rename: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateNodeArgs {
    node_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    node_type: Option<String>,
    #[serde(default)]
    properties: Option<Value>,
    #[serde(default)]
    aspect_names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteNodeArgs {
    node_id: String,
    #[serde(default)]
    permanent: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelocateArgs {
    node_id: String,
    target_parent_id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetTextArgs {
    node_id: String,
    content: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    major_version: Option<bool>,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PagedNodeArgs {
    node_id: String,
    #[serde(default)]
    skip_count: Option<u32>,
    #[serde(default)]
    max_items: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PagingArgs {
    #[serde(default)]
    skip_count: Option<u32>,
    #[serde(default)]
    max_items: Option<u32>,
}

fn me() -> String {
    "-me-".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonArgs {
    #[serde(default = "me")]
    person_id: String,
}

fn default_language() -> String {
    "afts".to_string()
}

/// Either a ready query string or tokens for the query builder.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    tokens: Option<Vec<QueryToken>>,
    #[serde(default)]
    combinator: Combinator,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    skip_count: Option<u32>,
    #[serde(default)]
    max_items: Option<u32>,
    #[serde(default)]
    sort: Option<Value>,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    fields: Vec<String>,
}

impl SearchArgs {
    fn into_body(self) -> Result<Value, DeskError> {
        let query = match (self.query, self.tokens) {
            (Some(q), _) if !q.trim().is_empty() => q,
            (_, Some(tokens)) => build_query(&tokens, self.combinator)?,
            _ => return Err(DeskError::validation("search.query needs query or tokens")),
        };
        let mut body = Map::new();
        body.insert(
            "query".into(),
            json!({ "query": query, "language": self.language }),
        );
        let mut paging = Map::new();
        insert_opt(&mut paging, "skipCount", self.skip_count.map(|v| json!(v)));
        insert_opt(&mut paging, "maxItems", self.max_items.map(|v| json!(v)));
        if !paging.is_empty() {
            body.insert("paging".into(), Value::Object(paging));
        }
        insert_opt(&mut body, "sort", self.sort);
        if !self.include.is_empty() {
            body.insert("include".into(), json!(self.include));
        }
        if !self.fields.is_empty() {
            body.insert("fields".into(), json!(self.fields));
        }
        Ok(Value::Object(body))
    }
}

fn default_http_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArgs {
    #[serde(default = "default_http_method")]
    http_method: String,
    #[serde(default)]
    api: Api,
    path: String,
    #[serde(default)]
    query: Option<Map<String, Value>>,
    #[serde(default)]
    body: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for m in AlfrescoMethod::ALL {
            assert_eq!(m.name().parse::<AlfrescoMethod>().unwrap(), m);
        }
        assert!("nodes.explode".parse::<AlfrescoMethod>().is_err());
    }

    #[test]
    fn search_body_from_tokens() {
        let args: SearchArgs = serde_json::from_value(json!({
            "tokens": [{"kind": "text", "value": "invoice"}, {"kind": "type", "value": "cm:content"}],
            "maxItems": 25
        }))
        .unwrap();
        let body = args.into_body().unwrap();
        assert_eq!(body["query"]["query"], r#"invoice AND TYPE:"cm:content""#);
        assert_eq!(body["query"]["language"], "afts");
        assert_eq!(body["paging"]["maxItems"], 25);
        assert!(body.get("sort").is_none());
    }

    #[test]
    fn person_ids_stay_in_their_path_segment() {
        assert_eq!(path_segment("personId", " -me- ").unwrap(), "-me-");
        assert_eq!(path_segment("personId", "jane.doe@example.com").unwrap(), "jane.doe@example.com");
        for bad in ["", "admin?skipCount=5", "admin#frag", "../sites", "a\\b"] {
            assert!(path_segment("personId", bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn search_requires_a_query() {
        let args: SearchArgs = serde_json::from_value(json!({ "query": "  " })).unwrap();
        assert!(args.into_body().is_err());
    }
}

#![allow(dead_code)]

use alfresco_desk::config::Config;
use alfresco_desk::db::LocalStore;
use alfresco_desk::router::{DeskState, desk_router};
use axum::{
    Json, Router,
    body::{Body, Bytes, to_bytes},
    extract::{Form, Multipart, Path},
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const TICKET: &str = "TICKET_abc";
/// `Basic base64("TICKET_abc")`.
pub const TICKET_HEADER: &str = "Basic VElDS0VUX2FiYw==";

/// Refresh token the fake realm accepts, and the access token it hands back.
pub const REFRESH_TOKEN: &str = "refresh-1";
pub const REFRESHED_ACCESS: &str = "access-2";
pub const REFRESHED_REFRESH: &str = "refresh-2";
pub const OIDC_REALM: &str = "alfresco";

const CORE: &str = "/alfresco/api/-default-/public/alfresco/versions/1";
const AUTH: &str = "/alfresco/api/-default-/public/authentication/versions/1";

pub struct TestApp {
    pub app: Router,
    pub store: LocalStore,
    // Keeps the scratch database alive for the test.
    _dir: TempDir,
}

pub async fn test_app() -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let database_url = format!("sqlite://{}", dir.path().join("desk.db").display());
    let store = LocalStore::open(&database_url, None)
        .await
        .expect("open store");
    let cfg = Config {
        data_dir: Some(dir.path().to_path_buf()),
        ..Config::default()
    };
    let addr: SocketAddr = "127.0.0.1:0".parse().expect("addr");
    let state = DeskState::new(store.clone(), cfg, addr).expect("state");
    TestApp {
        app: desk_router(state),
        store,
        _dir: dir,
    }
}

pub fn rpc_request(method: &str, params: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/rpc")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "method": method, "params": params }).to_string(),
        ))
        .expect("failed to build request")
}

/// One `/rpc` round trip: status and decoded body.
pub async fn rpc(app: &Router, method: &str, params: Value) -> (StatusCode, Value) {
    use tower::ServiceExt;
    let resp = app
        .clone()
        .oneshot(rpc_request(method, params))
        .await
        .expect("request failed");
    let status = resp.status();
    (status, body_json(resp).await)
}

pub async fn body_json(resp: Response) -> Value {
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&body).expect("response body was not json")
}

/// Serve `router` on an ephemeral loopback port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}

/// Minimal stand-in for an Alfresco repository, with a Keycloak-style
/// token endpoint for the `alfresco` realm on the same host.
pub async fn fake_alfresco() -> SocketAddr {
    let router = Router::new()
        .route(&format!("{AUTH}/tickets"), post(create_ticket))
        .route(
            &format!("/realms/{OIDC_REALM}/protocol/openid-connect/token"),
            post(token_endpoint),
        )
        .route(&format!("{CORE}/nodes/{{id}}"), get(get_node))
        .route(&format!("{CORE}/nodes/{{id}}/content"), get(node_content))
        .route(&format!("{CORE}/nodes/{{id}}/children"), post(upload_child));
    serve(router).await
}

fn alfresco_error(status: StatusCode, summary: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "errorKey": "framework.exception",
                "statusCode": status.as_u16(),
                "briefSummary": summary,
            }
        })),
    )
        .into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    let bearer = format!("Bearer {REFRESHED_ACCESS}");
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == TICKET_HEADER || v == bearer)
}

async fn token_endpoint(Form(form): Form<HashMap<String, String>>) -> Response {
    let grant = form.get("grant_type").map(String::as_str);
    let refresh = form.get("refresh_token").map(String::as_str);
    if grant != Some("refresh_token") || refresh != Some(REFRESH_TOKEN) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response();
    }
    Json(json!({
        "access_token": REFRESHED_ACCESS,
        "token_type": "Bearer",
        "expires_in": 300,
        "refresh_token": REFRESHED_REFRESH,
    }))
    .into_response()
}

async fn create_ticket(Json(body): Json<Value>) -> Response {
    if body["userId"] == "admin" && body["password"] == "admin" {
        (
            StatusCode::CREATED,
            Json(json!({ "entry": { "id": TICKET, "userId": "admin" } })),
        )
            .into_response()
    } else {
        alfresco_error(StatusCode::FORBIDDEN, "Login failed")
    }
}

async fn get_node(Path(id): Path<String>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return alfresco_error(StatusCode::UNAUTHORIZED, "Authentication failed");
    }
    if id == "missing" {
        return alfresco_error(StatusCode::NOT_FOUND, "The entity with id: missing was not found");
    }
    Json(json!({ "entry": { "id": id, "name": "Company Home", "isFolder": true } })).into_response()
}

async fn node_content(Path(id): Path<String>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return alfresco_error(StatusCode::UNAUTHORIZED, "Authentication failed");
    }
    (
        [
            (header::CONTENT_TYPE, "text/plain"),
            (header::ETAG, "\"v1\""),
        ],
        Bytes::from(format!("content of {id}")),
    )
        .into_response()
}

async fn upload_child(
    Path(parent): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !authorized(&headers) {
        return alfresco_error(StatusCode::UNAUTHORIZED, "Authentication failed");
    }
    let mut name = None;
    let mut size = 0usize;
    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name().map(str::to_string).as_deref() {
            Some("filedata") => size = field.bytes().await.map(|b| b.len()).unwrap_or(0),
            Some("name") => name = field.text().await.ok(),
            _ => {}
        }
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "entry": { "id": "uploaded-1", "name": name, "parentId": parent, "size": size }
        })),
    )
        .into_response()
}

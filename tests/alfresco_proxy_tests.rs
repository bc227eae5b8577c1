mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use alfresco_desk::db::models::ServerTokens;
use chrono::{Duration, Utc};
use common::{
    OIDC_REALM, REFRESH_TOKEN, REFRESHED_ACCESS, REFRESHED_REFRESH, TICKET, body_json,
    fake_alfresco, rpc, rpc_request, test_app,
};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn create_server(app: &axum::Router, base_url: String) -> i64 {
    let resp = app
        .clone()
        .oneshot(rpc_request(
            "backend.servers.create",
            json!({ "name": "Fake", "baseUrl": base_url }),
        ))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await["id"].as_i64().unwrap()
}

async fn login(app: &axum::Router, server_id: i64) -> Value {
    let resp = app
        .clone()
        .oneshot(rpc_request(
            "alfresco.auth.login",
            json!({ "serverId": server_id, "username": "admin", "password": "admin" }),
        ))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await
}

#[tokio::test]
async fn login_stores_ticket_and_later_calls_carry_it() {
    let t = test_app().await;
    let addr = fake_alfresco().await;
    let server_id = create_server(&t.app, format!("http://{addr}")).await;

    let resp = t
        .app
        .clone()
        .oneshot(rpc_request(
            "alfresco.nodes.get",
            json!({ "serverId": server_id, "nodeId": "-root-" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["code"], "UNAUTHORIZED");

    let session = login(&t.app, server_id).await;
    assert_eq!(session["ticket"], TICKET);
    let stored = t.store.get_server(server_id).await.unwrap();
    assert_eq!(stored.token.as_deref(), Some(TICKET));
    assert_eq!(stored.username.as_deref(), Some("admin"));

    let resp = t
        .app
        .clone()
        .oneshot(rpc_request(
            "alfresco.nodes.get",
            json!({ "serverId": server_id, "nodeId": "-root-" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let node = body_json(resp).await;
    assert_eq!(node["entry"]["id"], "-root-");

    let resp = t
        .app
        .oneshot(rpc_request(
            "alfresco.call",
            json!({
                "method": "nodes.get",
                "serverId": server_id,
                "args": { "nodeId": "workspace://SpacesStore/abc-1" }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["entry"]["id"], "abc-1");
}

#[tokio::test]
async fn upstream_not_found_keeps_alfresco_details() {
    let t = test_app().await;
    let addr = fake_alfresco().await;
    let server_id = create_server(&t.app, format!("http://{addr}")).await;
    login(&t.app, server_id).await;

    let resp = t
        .app
        .oneshot(rpc_request(
            "alfresco.nodes.get",
            json!({ "serverId": server_id, "nodeId": "missing" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["message"], "The entity with id: missing was not found");
    assert_eq!(body["details"]["error"]["statusCode"], 404);
}

#[tokio::test]
async fn unreachable_repository_is_a_connection_error() {
    let t = test_app().await;
    // Bind and drop to get a port nobody listens on.
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let resp = t
        .app
        .oneshot(rpc_request(
            "alfresco.auth.login",
            json!({
                "baseUrl": format!("http://127.0.0.1:{port}"),
                "username": "admin",
                "password": "admin"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(resp).await["code"], "CONNECTION_ERROR");
}

#[tokio::test]
async fn stream_forwards_content_and_headers() {
    let t = test_app().await;
    let addr = fake_alfresco().await;
    let server_id = create_server(&t.app, format!("http://{addr}")).await;
    login(&t.app, server_id).await;

    let resp = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/rpc-stream?method=nodes.content&serverId={server_id}&nodeId=doc-7"
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(resp.headers()[header::ETAG], "\"v1\"");
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"content of doc-7");

    let resp = t
        .app
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/rpc-stream?method=nodes.rendition&serverId={server_id}&nodeId=doc-7"
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn binary_upload_creates_child() {
    let t = test_app().await;
    let addr = fake_alfresco().await;
    let server_id = create_server(&t.app, format!("http://{addr}")).await;
    login(&t.app, server_id).await;

    let boundary = "desk-test-boundary";
    let params = json!({ "serverId": server_id, "parentId": "-root-" }).to_string();
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"method\"\r\n\r\nalfresco.nodes.upload\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"params\"\r\n\r\n{params}\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
         Content-Type: text/plain\r\n\r\nhello repository\r\n\
         --{b}--\r\n",
        b = boundary
    );
    let resp = t
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rpc-binary")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created = body_json(resp).await;
    assert_eq!(created["entry"]["name"], "notes.txt");
    assert_eq!(created["entry"]["parentId"], "-root-");
    assert_eq!(created["entry"]["size"], 16);
}

#[tokio::test]
async fn binary_upload_requires_a_file() {
    let t = test_app().await;
    let boundary = "desk-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"method\"\r\n\r\nalfresco.nodes.upload\r\n--{b}--\r\n",
        b = boundary
    );
    let resp = t
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rpc-binary")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn oidc_authorize_url_points_at_local_start_route() {
    let t = test_app().await;
    let resp = t
        .app
        .clone()
        .oneshot(rpc_request(
            "backend.servers.create",
            json!({
                "name": "SSO",
                "baseUrl": "https://ecm.example.com",
                "authType": "openid_connect",
                "oidcHost": "https://sso.example.com",
                "oidcRealm": "alfresco",
                "oidcClientId": "desk",
            }),
        ))
        .await
        .unwrap();
    let server_id = body_json(resp).await["id"].as_i64().unwrap();

    let resp = t
        .app
        .clone()
        .oneshot(rpc_request(
            "alfresco.auth.oidcAuthorizeUrl",
            json!({ "serverId": server_id }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let url = body_json(resp).await["url"].as_str().unwrap().to_string();
    assert!(url.ends_with(&format!("/auth/start/{server_id}")), "{url}");

    let resp = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/auth/start/{server_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = resp.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(
        "https://sso.example.com/realms/alfresco/protocol/openid-connect/auth?"
    ));
    assert!(location.contains("code_challenge_method=S256"));
    assert_eq!(resp.headers().get_all(header::SET_COOKIE).iter().count(), 3);

    // Password login is refused for OIDC servers.
    let resp = t
        .app
        .clone()
        .oneshot(rpc_request(
            "alfresco.auth.login",
            json!({ "serverId": server_id, "username": "a", "password": "b" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // A callback without the sign-in cookies renders the error page.
    let resp = t
        .app
        .oneshot(
            Request::builder()
                .uri("/auth/callback?code=abc&state=xyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let page = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert!(std::str::from_utf8(&page).unwrap().contains("Sign-in failed"));
}

#[tokio::test]
async fn stored_ticket_is_not_sent_to_another_base_url() {
    let t = test_app().await;
    let home = fake_alfresco().await;
    let elsewhere = fake_alfresco().await;
    let server_id = create_server(&t.app, format!("http://{home}")).await;
    login(&t.app, server_id).await;

    let (status, body) = rpc(
        &t.app,
        "alfresco.nodes.get",
        json!({
            "serverId": server_id,
            "baseUrl": format!("http://{elsewhere}"),
            "nodeId": "-root-"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    // The stored URL itself, spelled with a trailing slash, is fine.
    let (status, body) = rpc(
        &t.app,
        "alfresco.nodes.get",
        json!({
            "serverId": server_id,
            "baseUrl": format!("http://{home}/"),
            "nodeId": "-root-"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entry"]["id"], "-root-");
}

#[tokio::test]
async fn expiring_oidc_token_is_refreshed_before_the_call() {
    let t = test_app().await;
    let addr = fake_alfresco().await;
    let (status, server) = rpc(
        &t.app,
        "backend.servers.create",
        json!({
            "name": "SSO",
            "baseUrl": format!("http://{addr}"),
            "authType": "openid_connect",
            "oidcHost": format!("http://{addr}"),
            "oidcRealm": OIDC_REALM,
            "oidcClientId": "desk",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let server_id = server["id"].as_i64().unwrap();
    t.store
        .store_server_tokens(
            server_id,
            ServerTokens {
                username: Some("jane".into()),
                token: "access-1".into(),
                refresh_token: Some(REFRESH_TOKEN.into()),
                expires_at: Some(Utc::now() + Duration::seconds(5)),
            },
        )
        .await
        .unwrap();

    let (status, node) = rpc(
        &t.app,
        "alfresco.nodes.get",
        json!({ "serverId": server_id, "nodeId": "-root-" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{node}");
    assert_eq!(node["entry"]["id"], "-root-");

    let stored = t.store.get_server(server_id).await.unwrap();
    assert_eq!(stored.token.as_deref(), Some(REFRESHED_ACCESS));
    assert_eq!(stored.refresh_token.as_deref(), Some(REFRESHED_REFRESH));
    assert_eq!(stored.username.as_deref(), Some("jane"));
    assert!(stored.token_expires_at.unwrap() > Utc::now() + Duration::seconds(200));
}

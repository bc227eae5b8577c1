mod common;

use alfresco_desk::client::{BackendLocator, connect_or_spawn};
use alfresco_desk::db::models::NewServer;
use alfresco_desk::error::{DeskError, ErrorCode};
use alfresco_desk::runtime::PortFile;
use axum::{Json, Router, routing::get};
use common::{serve, test_app};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn locator_finds_live_backend_and_client_round_trips() {
    let t = test_app().await;
    let addr = serve(t.app.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let port_file = PortFile::new(dir.path().join(".runtime/backend-port"));
    port_file.publish(addr.port()).await.unwrap();

    let locator = BackendLocator::new(port_file.clone());
    let client = locator.wait(Duration::from_secs(5)).await.unwrap();

    let health = client.health().await.unwrap();
    assert_eq!(health.service, "alfresco-desk-backend");

    let user = client.user().await.unwrap();
    assert_eq!(user.username, "local");

    let created = client
        .create_server(&NewServer {
            name: "Repo".into(),
            base_url: "http://localhost:8080".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let servers = client.list_servers().await.unwrap();
    assert_eq!(servers, vec![created]);

    let err = client
        .call::<_, serde_json::Value>("backend.nope", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DeskError::Remote { code: ErrorCode::NotFound, .. }
    ));

    port_file.remove().await;
    assert!(locator.probe().await.is_err());
}

#[tokio::test]
async fn locator_rejects_foreign_service() {
    let impostor = Router::new().route(
        "/health",
        get(|| async { Json(json!({ "service": "something-else", "version": "1", "status": "ok" })) }),
    );
    let addr = serve(impostor).await;

    let dir = tempfile::tempdir().unwrap();
    let port_file = PortFile::new(dir.path().join("backend-port"));
    port_file.publish(addr.port()).await.unwrap();

    let err = BackendLocator::new(port_file).probe().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    assert!(err.to_string().contains("something-else"));
}

#[tokio::test]
async fn waiting_without_a_backend_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let locator = BackendLocator::new(PortFile::new(dir.path().join("backend-port")))
        .with_poll_interval(Duration::from_millis(20));

    let err = connect_or_spawn(&locator, None, Duration::from_millis(150))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Timeout);
}

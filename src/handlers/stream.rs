use crate::alfresco::DownloadRequest;
use crate::error::DeskError;
use crate::router::DeskState;
use axum::{
    body::Body,
    extract::{Query, State, rejection::QueryRejection},
    http::header,
    response::Response,
};
use tracing::debug;

const FORWARDED_HEADERS: [header::HeaderName; 5] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_DISPOSITION,
    header::ETAG,
    header::LAST_MODIFIED,
];

/// GET /rpc-stream -> node content streamed straight through from the repository.
pub async fn rpc_stream_handler(
    State(state): State<DeskState>,
    query: Result<Query<DownloadRequest>, QueryRejection>,
) -> Result<Response, DeskError> {
    let Query(request) = query.map_err(|rejection| DeskError::Validation {
        message: "invalid stream request".to_string(),
        details: Some(serde_json::json!({ "reason": rejection.body_text() })),
    })?;

    let upstream = state.alfresco.download(&state.store, &request).await?;
    debug!(
        method = ?request.method,
        node_id = %request.node_id,
        status = %upstream.status(),
        "streaming content"
    );

    let mut builder = Response::builder().status(upstream.status());
    for name in FORWARDED_HEADERS {
        if let Some(value) = upstream.headers().get(&name) {
            builder = builder.header(name, value.clone());
        }
    }
    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| DeskError::Internal(format!("building stream response: {e}")))
}

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::{ApiErrorBody, DeskError, ErrorCode};
use crate::types::RpcRequest;

/// `POST /rpc` body, validated before dispatch.
///
/// Body rejections keep their HTTP status (413 for oversized bodies, 415 for
/// a wrong content type) but use the common error body.
pub struct RpcEnvelope(pub RpcRequest);

impl<S> FromRequest<S> for RpcEnvelope
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(envelope) = match Json::<RpcRequest>::from_request(req, state).await {
            Ok(v) => v,
            Err(rejection) => return Err(json_rejection(rejection)),
        };

        if envelope.method.trim().is_empty() {
            return Err(DeskError::validation("method must not be empty").into_response());
        }
        Ok(RpcEnvelope(envelope))
    }
}

fn json_rejection(rejection: JsonRejection) -> Response {
    let (status, message) = match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => (StatusCode::PAYLOAD_TOO_LARGE, "request body too large"),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "expected an application/json body",
        ),
        _ => (StatusCode::BAD_REQUEST, "request body is not a valid RPC envelope"),
    };
    body_rejection(status, message, rejection.body_text())
}

/// Error body for a request that failed before reaching a handler.
pub fn body_rejection(status: StatusCode, message: &str, reason: String) -> Response {
    tracing::warn!(%status, %reason, "request body rejected");
    let body = ApiErrorBody {
        code: ErrorCode::ValidationError,
        message: message.to_string(),
        details: Some(json!({ "reason": reason })),
    };
    (status, Json(body)).into_response()
}

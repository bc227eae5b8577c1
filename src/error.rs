use axum::{Json, http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

/// Error codes shared by the backend and the RPC client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    Unauthorized,
    Forbidden,
    NotFound,
    Timeout,
    ConnectionError,
    ServiceUnavailable,
    Conflict,
    #[serde(other)]
    UnknownError,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::ConnectionError => StatusCode::BAD_GATEWAY,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::UnknownError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classify an upstream HTTP status.
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ErrorCode::ValidationError
            }
            StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
            StatusCode::FORBIDDEN => ErrorCode::Forbidden,
            StatusCode::NOT_FOUND => ErrorCode::NotFound,
            StatusCode::CONFLICT => ErrorCode::Conflict,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorCode::Timeout,
            StatusCode::SERVICE_UNAVAILABLE => ErrorCode::ServiceUnavailable,
            // CONNECTION_ERROR is reserved for failing to reach the repository at all.
            _ => ErrorCode::UnknownError,
        }
    }
}

#[derive(Debug, ThisError)]
pub enum DeskError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("upstream returned {status}: {message}")]
    Upstream {
        status: StatusCode,
        message: String,
        details: Option<Value>,
    },

    /// Error decoded from a backend response on the client side.
    #[error("{message}")]
    Remote {
        code: ErrorCode,
        message: String,
        details: Option<Value>,
    },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("OAuth flow error: {0}")]
    OauthFlow(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DeskError {
    pub fn validation(message: impl Into<String>) -> Self {
        DeskError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            DeskError::Validation { .. }
            | DeskError::Json(_)
            | DeskError::UrlParse(_)
            | DeskError::OauthFlow(_) => ErrorCode::ValidationError,
            DeskError::MethodNotFound(_) | DeskError::NotFound(_) => ErrorCode::NotFound,
            DeskError::Conflict(_) => ErrorCode::Conflict,
            DeskError::Unauthorized(_)
            | DeskError::Oauth2Token(_)
            | DeskError::Oauth2Server { .. } => ErrorCode::Unauthorized,
            DeskError::Timeout(_) => ErrorCode::Timeout,
            DeskError::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            DeskError::Upstream { status, .. } => ErrorCode::from_status(*status),
            DeskError::Remote { code, .. } => *code,
            DeskError::Reqwest(e) if e.is_timeout() => ErrorCode::Timeout,
            DeskError::Reqwest(e) if e.is_connect() || e.is_request() => {
                ErrorCode::ConnectionError
            }
            DeskError::Reqwest(e) => e
                .status()
                .map(ErrorCode::from_status)
                .unwrap_or(ErrorCode::ConnectionError),
            DeskError::Database(SqlxError::RowNotFound) => ErrorCode::NotFound,
            DeskError::Database(SqlxError::Database(db))
                if db.is_unique_violation() || db.is_foreign_key_violation() =>
            {
                ErrorCode::Conflict
            }
            DeskError::Database(SqlxError::PoolTimedOut) => ErrorCode::ServiceUnavailable,
            DeskError::Database(_)
            | DeskError::Migrate(_)
            | DeskError::Io(_)
            | DeskError::Internal(_) => ErrorCode::UnknownError,
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            DeskError::Validation { details, .. }
            | DeskError::Upstream { details, .. }
            | DeskError::Remote { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Transient network and auth failures. These are routine for a desktop
    /// client and are logged as warnings rather than errors.
    pub fn is_expected(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::Timeout
                | ErrorCode::ConnectionError
                | ErrorCode::ServiceUnavailable
                | ErrorCode::Unauthorized
        )
    }

    /// Whether a retry may succeed (used for token refresh only).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::Timeout | ErrorCode::ConnectionError | ErrorCode::ServiceUnavailable
        ) || matches!(self, DeskError::Oauth2Token(_))
    }

    pub fn public_message(&self) -> String {
        match self {
            DeskError::Database(SqlxError::RowNotFound) => "Record not found.".to_string(),
            DeskError::Database(SqlxError::Database(db)) if db.is_unique_violation() => {
                "A record with the same identity already exists.".to_string()
            }
            DeskError::Database(SqlxError::Database(db)) if db.is_foreign_key_violation() => {
                "The record is still referenced or references a missing record.".to_string()
            }
            DeskError::Database(_)
            | DeskError::Migrate(_)
            | DeskError::Io(_)
            | DeskError::Internal(_) => "An internal error occurred.".to_string(),
            DeskError::Upstream { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for DeskError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => DeskError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                DeskError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => DeskError::Json(parse_err.into_inner()),
            RequestTokenError::Other(s) => DeskError::Oauth2Token(s),
        }
    }
}

impl IntoResponse for DeskError {
    fn into_response(self) -> axum::response::Response {
        let code = self.code();
        if self.is_expected() {
            tracing::warn!(code = ?code, error = %self, "request failed");
        } else if code == ErrorCode::UnknownError {
            tracing::error!(code = ?code, error = %self, "request failed");
        } else {
            tracing::debug!(code = ?code, error = %self, "request rejected");
        }
        let body = ApiErrorBody {
            code,
            message: self.public_message(),
            details: self.details().cloned(),
        };
        (code.status(), Json(body)).into_response()
    }
}

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<ApiErrorBody> for DeskError {
    fn from(body: ApiErrorBody) -> Self {
        DeskError::Remote {
            code: body.code,
            message: body.message,
            details: body.details,
        }
    }
}

/// Alfresco REST error envelope.
#[derive(Deserialize, Debug)]
pub struct AlfrescoError {
    pub error: AlfrescoErrorBody,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AlfrescoErrorBody {
    #[serde(default)]
    pub error_key: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub brief_summary: Option<String>,
}

impl AlfrescoError {
    /// Build an upstream error from a non-success response body.
    pub fn into_desk_error(body: &[u8], status: StatusCode) -> DeskError {
        let details: Option<Value> = serde_json::from_slice(body).ok();
        let message = serde_json::from_slice::<AlfrescoError>(body)
            .ok()
            .and_then(|e| e.error.brief_summary.or(e.error.error_key))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("upstream error")
                    .to_string()
            });
        DeskError::Upstream {
            status,
            message,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_statuses() {
        let table = [
            (ErrorCode::ValidationError, 400),
            (ErrorCode::Unauthorized, 401),
            (ErrorCode::Forbidden, 403),
            (ErrorCode::NotFound, 404),
            (ErrorCode::Timeout, 504),
            (ErrorCode::ConnectionError, 502),
            (ErrorCode::ServiceUnavailable, 503),
            (ErrorCode::Conflict, 409),
            (ErrorCode::UnknownError, 500),
        ];
        for (code, status) in table {
            assert_eq!(code.status().as_u16(), status, "{code:?}");
        }
    }

    #[test]
    fn error_codes_serialize_as_screaming_snake_case() {
        let v = serde_json::to_value(ErrorCode::ValidationError).unwrap();
        assert_eq!(v, "VALIDATION_ERROR");
        let parsed: ErrorCode = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(parsed, ErrorCode::UnknownError);
    }

    #[test]
    fn upstream_status_classification() {
        let err = DeskError::Upstream {
            status: StatusCode::UNAUTHORIZED,
            message: "no".into(),
            details: None,
        };
        assert_eq!(err.code(), ErrorCode::Unauthorized);
        assert!(err.is_expected());

        let err = DeskError::Upstream {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "bad".into(),
            details: None,
        };
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(!err.is_expected());

        assert_eq!(
            ErrorCode::from_status(StatusCode::BAD_GATEWAY),
            ErrorCode::UnknownError
        );
        assert_eq!(
            ErrorCode::from_status(StatusCode::REQUEST_TIMEOUT),
            ErrorCode::Timeout
        );
    }

    #[test]
    fn alfresco_error_body_becomes_message_and_details() {
        let body = br#"{"error":{"errorKey":"framework.exception.EntityNotFound","statusCode":404,"briefSummary":"07210001 The entity with id: abc was not found"}}"#;
        let err = AlfrescoError::into_desk_error(body, StatusCode::NOT_FOUND);
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(err.to_string().contains("was not found"));
        assert_eq!(err.details().unwrap()["error"]["statusCode"], 404);
    }

    #[test]
    fn database_internals_are_hidden() {
        let err = DeskError::Internal("secret path /x/y".into());
        assert_eq!(err.public_message(), "An internal error occurred.");
        assert_eq!(err.code(), ErrorCode::UnknownError);
    }
}

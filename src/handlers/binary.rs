use crate::alfresco::{Target, UploadFile, UploadKind};
use crate::error::DeskError;
use crate::middleware::body_rejection;
use crate::router::DeskState;
use crate::types::rpc::decode_params;
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::info;

/// Parts of a `/rpc-binary` form: `method`, `params` (JSON text) and `file`.
#[derive(Default)]
struct BinaryForm {
    method: Option<String>,
    params: Option<String>,
    file: Option<UploadFile>,
}

/// POST /rpc-binary -> multipart upload proxied to the repository.
pub async fn rpc_binary_handler(
    State(state): State<DeskState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, Response> {
    let multipart = multipart.map_err(|rejection| {
        body_rejection(
            rejection.status(),
            "expected a multipart/form-data body",
            rejection.body_text(),
        )
    })?;
    let form = read_form(multipart).await.map_err(multipart_error)?;

    let method = form
        .method
        .ok_or_else(|| DeskError::validation("multipart field `method` is required"))
        .map_err(IntoResponse::into_response)?;
    let kind: UploadKind = method.parse().map_err(IntoResponse::into_response)?;
    let file = form
        .file
        .ok_or_else(|| DeskError::validation("multipart field `file` is required"))
        .map_err(IntoResponse::into_response)?;
    let params: Value = match form.params.as_deref() {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw).map_err(|e| {
            DeskError::Validation {
                message: "multipart field `params` is not valid JSON".to_string(),
                details: Some(serde_json::json!({ "reason": e.to_string() })),
            }
            .into_response()
        })?,
        _ => Value::Null,
    };
    let target: Target =
        decode_params(kind.name(), params.clone()).map_err(IntoResponse::into_response)?;

    info!(
        method = kind.name(),
        file_name = %file.file_name,
        size = file.bytes.len(),
        "binary upload"
    );
    let result = state
        .alfresco
        .upload(&state.store, target, kind, params, file)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(result))
}

async fn read_form(mut multipart: Multipart) -> Result<BinaryForm, MultipartError> {
    let mut form = BinaryForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("method") => form.method = Some(field.text().await?),
            Some("params") => form.params = Some(field.text().await?),
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                form.file = Some(UploadFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }
    Ok(form)
}

fn multipart_error(err: MultipartError) -> Response {
    body_rejection(err.status(), "could not read multipart body", err.body_text())
}

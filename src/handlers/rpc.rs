use crate::error::DeskError;
use crate::middleware::RpcEnvelope;
use crate::router::DeskState;
use axum::{Json, extract::State};
use serde_json::Value;

/// POST /rpc -> dispatch `{method, params}` and return the raw result.
pub async fn rpc_handler(
    State(state): State<DeskState>,
    RpcEnvelope(request): RpcEnvelope,
) -> Result<Json<Value>, DeskError> {
    let registry = state.registry.clone();
    let result = registry
        .dispatch(state, &request.method, request.params)
        .await?;
    Ok(Json(result))
}

use crate::error::DeskError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// `POST /rpc` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Params type for methods that take none.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Empty {}

/// `GET /health` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub service: String,
    pub version: String,
    pub status: String,
}

/// Deserialize method params; a missing or `null` value reads as `{}`.
pub fn decode_params<T: DeserializeOwned>(method: &str, params: Value) -> Result<T, DeskError> {
    let params = if params.is_null() {
        Value::Object(Map::new())
    } else {
        params
    };
    serde_json::from_value(params).map_err(|e| DeskError::Validation {
        message: format!("invalid params for {method}: {e}"),
        details: Some(json!({ "method": method, "reason": e.to_string() })),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[derive(Debug, Deserialize)]
    struct Paging {
        #[serde(default)]
        max_items: Option<u32>,
    }

    #[test]
    fn null_params_read_as_empty_object() {
        let p: Paging = decode_params("x", Value::Null).unwrap();
        assert_eq!(p.max_items, None);
        let _: Empty = decode_params("x", Value::Null).unwrap();
    }

    #[test]
    fn type_errors_become_validation_errors() {
        let err = decode_params::<Paging>("sites.list", json!({ "max_items": "ten" })).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(err.details().unwrap()["method"], "sites.list");
    }
}

use crate::error::DeskError;
use crate::router::DeskState;
use crate::types::rpc::decode_params;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

type RpcFuture = BoxFuture<'static, Result<Value, DeskError>>;

type Handler = Arc<dyn Fn(DeskState, Value) -> RpcFuture + Send + Sync>;

/// Method name to handler map. Filled once at startup, read-only afterwards.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    handlers: HashMap<String, Handler>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with both feature groups installed.
    pub fn with_default_methods() -> Self {
        let mut registry = Self::new();
        super::alfresco_methods::register_alfresco_methods(&mut registry);
        super::backend_methods::register_backend_methods(&mut registry);
        registry
    }

    /// Register a typed handler. Params are decoded (and rejected with a
    /// validation error) before the handler runs; the result is serialized
    /// back to JSON.
    pub fn register<P, R, F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + 'static,
        F: Fn(DeskState, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, DeskError>> + Send + 'static,
    {
        let name = name.into();
        let method = name.clone();
        let handler = Arc::new(handler);
        let boxed: Handler = Arc::new(move |state: DeskState, params: Value| -> RpcFuture {
            let handler = handler.clone();
            let method = method.clone();
            Box::pin(async move {
                let params: P = decode_params(&method, params)?;
                let out = (*handler)(state, params).await?;
                Ok(serde_json::to_value(out)?)
            })
        });
        if self.handlers.insert(name.clone(), boxed).is_some() {
            warn!(method = %name, "rpc method registered twice; keeping the last one");
        }
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Registered names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub async fn dispatch(
        &self,
        state: DeskState,
        method: &str,
        params: Value,
    ) -> Result<Value, DeskError> {
        let handler = self
            .handlers
            .get(method)
            .cloned()
            .ok_or_else(|| DeskError::MethodNotFound(method.to_string()))?;
        let started = Instant::now();
        let result = handler(state, params).await;
        debug!(
            method,
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rpc dispatched"
        );
        result
    }
}

use crate::alfresco::AlfrescoProxy;
use crate::config::Config;
use crate::db::LocalStore;
use crate::error::DeskError;
use crate::handlers::{binary, health, oidc, rpc, stream};
use crate::rpc::MethodRegistry;
use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;
use url::Url;

#[derive(Clone)]
pub struct DeskState {
    pub store: LocalStore,
    pub alfresco: AlfrescoProxy,
    pub registry: Arc<MethodRegistry>,
    pub config: Arc<Config>,
    /// `http://host:port/` the server is reachable at; OIDC redirects point here.
    pub local_base: Url,
    cookie_key: Key,
}

impl DeskState {
    pub fn new(store: LocalStore, config: Config, local_addr: SocketAddr) -> Result<Self, DeskError> {
        let local_base = Url::parse(&format!("http://{local_addr}/"))?;
        let registry = MethodRegistry::with_default_methods();
        debug!(methods = ?registry.methods(), "rpc methods registered");
        Ok(Self {
            store,
            alfresco: AlfrescoProxy::new(&config)?,
            registry: Arc::new(registry),
            config: Arc::new(config),
            local_base,
            // Per-process key: pending OIDC cookies do not survive a restart.
            cookie_key: Key::generate(),
        })
    }
}

impl FromRef<DeskState> for Key {
    fn from_ref(state: &DeskState) -> Self {
        state.cookie_key.clone()
    }
}

pub fn desk_router(state: DeskState) -> Router {
    let body_limit = state.config.max_body_bytes;
    Router::new()
        .route("/health", get(health::health))
        .route("/rpc", post(rpc::rpc_handler))
        .route("/rpc-binary", post(binary::rpc_binary_handler))
        .route("/rpc-stream", get(stream::rpc_stream_handler))
        .route("/auth/start/{server_id}", get(oidc::oidc_entry))
        .route("/auth/callback", get(oidc::oidc_callback))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Only the desktop shell talks to the backend: loopback pages and
/// file/custom-scheme renderers (which send `Origin: null`).
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            is_local_origin(origin)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

pub fn is_local_origin(origin: &HeaderValue) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };
    if origin == "null" {
        return true;
    }
    let Ok(url) = Url::parse(origin) else {
        return false;
    };
    match url.scheme() {
        "http" | "https" => matches!(
            url.host_str(),
            Some("localhost" | "127.0.0.1" | "[::1]")
        ),
        "file" | "app" | "tauri" => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_loopback_origins_pass_cors() {
        for ok in ["null", "http://localhost:5173", "http://127.0.0.1:3000", "app://desk"] {
            assert!(is_local_origin(&HeaderValue::from_static(ok)), "{ok}");
        }
        for bad in ["https://evil.example.com", "http://192.168.1.5:8080"] {
            assert!(!is_local_origin(&HeaderValue::from_static(bad)), "{bad}");
        }
    }
}

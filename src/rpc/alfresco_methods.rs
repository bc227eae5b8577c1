//! `alfresco.*` methods: proxied repository operations.

use crate::alfresco::auth::OidcSettings;
use crate::alfresco::{AlfrescoMethod, Target};
use crate::error::DeskError;
use crate::router::DeskState;
use crate::rpc::registry::MethodRegistry;
use crate::types::rpc::decode_params;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub const GENERIC_CALL: &str = "alfresco.call";
pub const OIDC_AUTHORIZE_URL: &str = "alfresco.auth.oidcAuthorizeUrl";

/// Params of `alfresco.call`: the operation name, its args, and the target
/// fields at the top level.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallParams {
    pub method: String,
    #[serde(default)]
    pub args: Value,
    #[serde(flatten)]
    pub target: Target,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeParams {
    pub server_id: i64,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeUrl {
    pub url: Url,
}

pub fn register_alfresco_methods(registry: &mut MethodRegistry) {
    registry.register(GENERIC_CALL, |state: DeskState, p: CallParams| async move {
        let name = p.method.strip_prefix("alfresco.").unwrap_or(&p.method);
        let method: AlfrescoMethod = name.parse()?;
        state.alfresco.call(&state.store, p.target, method, p.args).await
    });

    // Named methods take the target and the operation args in one object.
    for method in AlfrescoMethod::ALL {
        let rpc_name = format!("alfresco.{}", method.name());
        let decode_as = rpc_name.clone();
        registry.register(rpc_name, move |state: DeskState, params: Value| {
            let decode_as = decode_as.clone();
            async move {
                let target: Target = decode_params(&decode_as, params.clone())?;
                state.alfresco.call(&state.store, target, method, params).await
            }
        });
    }

    registry.register(OIDC_AUTHORIZE_URL, oidc_authorize_url);
}

async fn oidc_authorize_url(state: DeskState, p: AuthorizeParams) -> Result<AuthorizeUrl, DeskError> {
    let server = state.store.get_server(p.server_id).await?;
    OidcSettings::from_server(&server)?;
    let url = state.local_base.join(&format!("auth/start/{}", server.id))?;
    Ok(AuthorizeUrl { url })
}

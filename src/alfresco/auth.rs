use crate::alfresco::endpoints::oidc_endpoint;
use crate::db::models::{AuthType, ServerRecord, ServerTokens};
use crate::error::DeskError;

use backon::{ExponentialBuilder, Retryable};
use base64::Engine;
use chrono::Utc;
use oauth2::{
    AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, CsrfToken, EndpointNotSet,
    EndpointSet, ExtraTokenFields, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl,
    RefreshToken, Scope, StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// How a proxied request authenticates.
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    #[default]
    Anonymous,
    /// Alfresco ticket, sent as `Basic base64(ticket)`.
    Ticket(String),
    Basic {
        username: String,
        password: String,
    },
    Bearer(String),
}

impl Credentials {
    pub fn apply(&self, req: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::Anonymous => req,
            Credentials::Ticket(ticket) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(ticket);
                req.header(reqwest::header::AUTHORIZATION, format!("Basic {encoded}"))
            }
            Credentials::Basic { username, password } => req.basic_auth(username, Some(password)),
            Credentials::Bearer(token) => req.bearer_auth(token),
        }
    }
}

/// Refresh OIDC tokens this close to expiry.
pub const REFRESH_LEEWAY_SECS: i64 = 30;

pub fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// Realm settings of an `openid_connect` server.
#[derive(Debug, Clone)]
pub struct OidcSettings {
    pub auth_url: Url,
    pub token_url: Url,
    pub client_id: String,
}

impl OidcSettings {
    pub fn from_server(server: &ServerRecord) -> Result<Self, DeskError> {
        if server.auth_type != AuthType::OpenidConnect {
            return Err(DeskError::validation(format!(
                "server {} does not use OpenID Connect",
                server.id
            )));
        }
        let (Some(host), Some(realm), Some(client_id)) = (
            server.oidc_host.as_deref(),
            server.oidc_realm.as_deref(),
            server.oidc_client_id.as_deref(),
        ) else {
            return Err(DeskError::validation(format!(
                "server {} is missing oidcHost, oidcRealm or oidcClientId",
                server.id
            )));
        };
        Ok(Self {
            auth_url: oidc_endpoint(host, realm, "auth")?,
            token_url: oidc_endpoint(host, realm, "token")?,
            client_id: client_id.to_string(),
        })
    }

    fn client(&self) -> Result<OidcClient, DeskError> {
        let client = OAuth2Client::new(ClientId::new(self.client_id.clone()))
            .set_auth_uri(AuthUrl::new(self.auth_url.to_string())?)
            .set_token_uri(TokenUrl::new(self.token_url.to_string())?);
        Ok(client)
    }

    /// Authorization URL with PKCE and a fresh CSRF state.
    pub fn authorize_url(
        &self,
        redirect: &Url,
        challenge: PkceCodeChallenge,
    ) -> Result<(Url, CsrfToken), DeskError> {
        let client = self
            .client()?
            .set_redirect_uri(RedirectUrl::new(redirect.to_string())?);
        Ok(client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("offline_access".to_string()))
            .set_pkce_challenge(challenge)
            .url())
    }

    pub async fn exchange_code(
        &self,
        redirect: &Url,
        code: AuthorizationCode,
        verifier: PkceCodeVerifier,
        http_client: reqwest::Client,
    ) -> Result<ServerTokens, DeskError> {
        let client = self
            .client()?
            .set_redirect_uri(RedirectUrl::new(redirect.to_string())?);
        let response: OidcTokenResponse = client
            .exchange_code(code)
            .set_pkce_verifier(verifier)
            .request_async(&http_client)
            .await?;
        info!(client_id = %self.client_id, "authorization code exchanged");
        Ok(tokens_from_response(&response))
    }

    /// Refresh the access token, retrying transient failures.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        http_client: reqwest::Client,
        retry_policy: ExponentialBuilder,
    ) -> Result<ServerTokens, DeskError> {
        let client = self.client()?;
        let response: OidcTokenResponse = (|| async {
            client
                .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
                .request_async(&http_client)
                .await
                .map_err(DeskError::from)
        })
        .retry(retry_policy)
        .when(|e: &DeskError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("OIDC refresh retrying after error {}, sleeping {:?}", err, dur);
        })
        .await?;
        info!(client_id = %self.client_id, "access token refreshed");
        Ok(tokens_from_response(&response))
    }
}

/// Whether stored OIDC tokens need a refresh before use.
pub fn needs_refresh(server: &ServerRecord) -> bool {
    match server.token_expires_at {
        Some(expiry) => (expiry - Utc::now()).num_seconds() < REFRESH_LEEWAY_SECS,
        None => server.token.is_none(),
    }
}

fn tokens_from_response(response: &OidcTokenResponse) -> ServerTokens {
    let expires_at = response
        .expires_in()
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .map(|d| Utc::now() + d);
    ServerTokens {
        username: response
            .extra_fields()
            .id_token
            .as_deref()
            .and_then(username_from_id_token),
        token: response.access_token().secret().to_string(),
        refresh_token: response.refresh_token().map(|t| t.secret().to_string()),
        expires_at,
    }
}

/// Read `preferred_username` (or `email`) from an unverified ID token.
/// The token came straight from the token endpoint over TLS, so the claims
/// are only used for display.
pub fn username_from_id_token(id_token: &str) -> Option<String> {
    let payload_b64 = id_token.split('.').nth(1)?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&decoded).ok()?;
    claims
        .get("preferred_username")
        .or_else(|| claims.get("email"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OidcTokenField {
    #[serde(rename = "id_token")]
    pub id_token: Option<String>,
}
impl ExtraTokenFields for OidcTokenField {}

pub type OidcTokenResponse = StandardTokenResponse<OidcTokenField, BasicTokenType>;

pub type OidcClient = OAuth2Client<
    BasicErrorResponse,
    OidcTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_is_read_from_id_token_claims() {
        let claims = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(br#"{"preferred_username":"jdoe","email":"j@x.org"}"#);
        let token = format!("e30.{claims}.sig");
        assert_eq!(username_from_id_token(&token).as_deref(), Some("jdoe"));
        assert_eq!(username_from_id_token("not-a-jwt"), None);
    }

    #[test]
    fn ticket_is_sent_as_basic_auth() {
        let client = reqwest::Client::new();
        let req = Credentials::Ticket("TICKET_abc".into())
            .apply(client.get("http://localhost/"))
            .build()
            .unwrap();
        let header = req.headers()[reqwest::header::AUTHORIZATION].to_str().unwrap();
        assert_eq!(header, "Basic VElDS0VUX2FiYw==");
    }
}

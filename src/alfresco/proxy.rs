use crate::alfresco::auth::{Credentials, OidcSettings, default_retry_policy, needs_refresh};
use crate::alfresco::binary::{DownloadRequest, UploadFile, UploadKind};
use crate::alfresco::client::AlfrescoClient;
use crate::alfresco::methods::AlfrescoMethod;
use crate::config::Config;
use crate::db::LocalStore;
use crate::db::models::{AuthType, ServerRecord, ServerTokens};
use crate::db::servers::normalize_base_url;
use crate::error::DeskError;
use backon::ExponentialBuilder;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

/// Where a call goes and how it authenticates.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default)]
    pub server_id: Option<i64>,
    /// Overrides the stored URL, or addresses a server not saved yet.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub credentials: Option<InlineCredentials>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineCredentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub ticket: Option<String>,
}

impl TryFrom<InlineCredentials> for Credentials {
    type Error = DeskError;

    fn try_from(c: InlineCredentials) -> Result<Self, Self::Error> {
        match c {
            InlineCredentials {
                ticket: Some(ticket),
                ..
            } => Ok(Credentials::Ticket(ticket)),
            InlineCredentials {
                username: Some(username),
                password: Some(password),
                ..
            } => Ok(Credentials::Basic { username, password }),
            _ => Err(DeskError::validation(
                "credentials need a ticket or a username and password",
            )),
        }
    }
}

/// Forwards calls to remote repositories, attaching stored credentials.
/// No caching and no retries: every call builds its client from the
/// current database state.
#[derive(Clone)]
pub struct AlfrescoProxy {
    http: reqwest::Client,
    stream_http: reqwest::Client,
    retry_policy: ExponentialBuilder,
}

impl AlfrescoProxy {
    pub fn new(cfg: &Config) -> Result<Self, DeskError> {
        let user_agent = format!("alfresco-desk/{}", env!("CARGO_PKG_VERSION"));
        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent.clone())
            .connect_timeout(cfg.connect_timeout())
            .timeout(cfg.request_timeout());
        let mut stream_builder = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(cfg.connect_timeout())
            .read_timeout(cfg.request_timeout());
        if let Some(proxy_url) = cfg.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
            stream_builder = stream_builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        Ok(Self {
            http: builder.build()?,
            stream_http: stream_builder.build()?,
            retry_policy: default_retry_policy(),
        })
    }

    pub fn http(&self) -> reqwest::Client {
        self.http.clone()
    }

    pub async fn call(
        &self,
        store: &LocalStore,
        target: Target,
        method: AlfrescoMethod,
        args: Value,
    ) -> Result<Value, DeskError> {
        let server = match target.server_id {
            Some(id) => Some(store.get_server(id).await?),
            None => None,
        };
        if method == AlfrescoMethod::Login
            && server
                .as_ref()
                .is_some_and(|s| s.auth_type == AuthType::OpenidConnect)
        {
            return Err(DeskError::validation(
                "server uses OpenID Connect; sign in through auth.oidcAuthorizeUrl",
            ));
        }

        let client = self
            .client_for(store, &target, server.as_ref(), method.needs_credentials())
            .await?;
        debug!(method = method.name(), base = %client.base_url(), "proxy call");
        let result = method.execute(&client, args).await?;

        match (method, server) {
            (AlfrescoMethod::Login, Some(server)) => {
                let ticket = result["ticket"].as_str().unwrap_or_default().to_string();
                let username = result["userId"].as_str().map(str::to_string);
                store
                    .store_server_tokens(
                        server.id,
                        ServerTokens {
                            username,
                            token: ticket,
                            ..Default::default()
                        },
                    )
                    .await?;
                info!(server_id = server.id, "ticket stored");
            }
            (AlfrescoMethod::Logout, Some(server)) => {
                store.clear_server_tokens(server.id).await?;
                info!(server_id = server.id, "credentials cleared");
            }
            _ => {}
        }
        Ok(result)
    }

    pub async fn download(
        &self,
        store: &LocalStore,
        request: &DownloadRequest,
    ) -> Result<reqwest::Response, DeskError> {
        let server = store.get_server(request.server_id).await?;
        let target = Target {
            server_id: Some(server.id),
            ..Default::default()
        };
        let client = self
            .client_for(store, &target, Some(&server), true)
            .await?
            .with_http(self.stream_http.clone());
        request.send(&client).await
    }

    pub async fn upload(
        &self,
        store: &LocalStore,
        target: Target,
        kind: UploadKind,
        params: Value,
        file: UploadFile,
    ) -> Result<Value, DeskError> {
        let server = match target.server_id {
            Some(id) => Some(store.get_server(id).await?),
            None => None,
        };
        let client = self
            .client_for(store, &target, server.as_ref(), true)
            .await?
            .with_http(self.stream_http.clone());
        kind.execute(&client, params, file).await
    }

    async fn client_for(
        &self,
        store: &LocalStore,
        target: &Target,
        server: Option<&ServerRecord>,
        needs_credentials: bool,
    ) -> Result<AlfrescoClient, DeskError> {
        let base_url = target
            .base_url
            .as_deref()
            .or(server.map(|s| s.base_url.as_str()))
            .ok_or_else(|| DeskError::validation("serverId or baseUrl is required"))?;

        let credentials = match (target.credentials.clone(), server) {
            (Some(inline), _) => Credentials::try_from(inline)?,
            (None, Some(server)) if needs_credentials => {
                if normalize_base_url(base_url) != server.base_url {
                    return Err(DeskError::validation(format!(
                        "baseUrl does not match server {}; stored credentials are only sent to {}",
                        server.id, server.base_url
                    )));
                }
                self.stored_credentials(store, server).await?
            }
            _ => Credentials::Anonymous,
        };
        AlfrescoClient::new(self.http.clone(), base_url, credentials)
    }

    async fn stored_credentials(
        &self,
        store: &LocalStore,
        server: &ServerRecord,
    ) -> Result<Credentials, DeskError> {
        match server.auth_type {
            AuthType::Basic => server
                .token
                .clone()
                .filter(|t| !t.is_empty())
                .map(Credentials::Ticket)
                .ok_or_else(|| not_signed_in(server)),
            AuthType::OpenidConnect => {
                if !needs_refresh(server) {
                    return server
                        .token
                        .clone()
                        .map(Credentials::Bearer)
                        .ok_or_else(|| not_signed_in(server));
                }
                let refresh_token = server
                    .refresh_token
                    .as_deref()
                    .ok_or_else(|| not_signed_in(server))?;
                let settings = OidcSettings::from_server(server)?;
                let tokens = settings
                    .refresh(refresh_token, self.http.clone(), self.retry_policy.clone())
                    .await?;
                let access = tokens.token.clone();
                store.store_server_tokens(server.id, tokens).await?;
                Ok(Credentials::Bearer(access))
            }
        }
    }
}

fn not_signed_in(server: &ServerRecord) -> DeskError {
    DeskError::Unauthorized(format!(
        "not signed in to server {} ({})",
        server.id, server.name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_credentials_prefer_ticket() {
        let c = InlineCredentials {
            username: Some("admin".into()),
            password: Some("admin".into()),
            ticket: Some("TICKET_1".into()),
        };
        assert!(matches!(Credentials::try_from(c), Ok(Credentials::Ticket(t)) if t == "TICKET_1"));

        let c = InlineCredentials {
            username: Some("admin".into()),
            ..Default::default()
        };
        assert!(Credentials::try_from(c).is_err());
    }
}

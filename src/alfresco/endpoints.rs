use crate::error::DeskError;
use serde::Deserialize;
use url::Url;

pub const CORE_API: &str = "alfresco/api/-default-/public/alfresco/versions/1";
pub const SEARCH_API: &str = "alfresco/api/-default-/public/search/versions/1";
pub const AUTH_API: &str = "alfresco/api/-default-/public/authentication/versions/1";

/// Public REST API families.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Api {
    #[default]
    Core,
    Search,
    Auth,
}

impl Api {
    fn prefix(self) -> &'static str {
        match self {
            Api::Core => CORE_API,
            Api::Search => SEARCH_API,
            Api::Auth => AUTH_API,
        }
    }
}

/// Parse a server base URL, keeping any context path (`https://host/ctx`).
pub fn parse_base_url(raw: &str) -> Result<Url, DeskError> {
    let raw = raw.trim();
    let mut url = Url::parse(raw)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DeskError::validation(format!(
            "unsupported URL scheme: {}",
            url.scheme()
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Join a relative API path onto the base URL.
pub fn api_url(base: &Url, api: Api, path: &str) -> Result<Url, DeskError> {
    let path = path.trim_start_matches('/');
    if path.split('/').any(|seg| seg == ".." || seg == ".") || path.contains("://") {
        return Err(DeskError::validation(format!("invalid API path: {path}")));
    }
    let joined = if path.is_empty() {
        api.prefix().to_string()
    } else {
        format!("{}/{}", api.prefix(), path)
    };
    Ok(base.join(&joined)?)
}

/// Keycloak-style OpenID Connect endpoints for a realm.
pub fn oidc_endpoint(host: &str, realm: &str, endpoint: &str) -> Result<Url, DeskError> {
    let base = parse_base_url(host)?;
    Ok(base.join(&format!("realms/{realm}/protocol/openid-connect/{endpoint}"))?)
}

use crate::alfresco::auth::OidcSettings;
use crate::error::DeskError;
use crate::router::DeskState;
use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use time::Duration;
use tracing::info;
use url::Url;

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

const CSRF_COOKIE: &str = "oidc_csrf_token";
const PKCE_COOKIE: &str = "oidc_pkce_verifier";
const SERVER_COOKIE: &str = "oidc_server_id";

struct OidcSession {
    csrf: String,
    pkce_verifier: String,
    server_id: i64,
}

/// GET /auth/start/{server_id} -> redirects to the realm's login page.
pub async fn oidc_entry(
    State(state): State<DeskState>,
    Path(server_id): Path<i64>,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, DeskError> {
    let server = state.store.get_server(server_id).await?;
    let settings = OidcSettings::from_server(&server)?;

    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf_token) = settings.authorize_url(&callback_url(&state)?, challenge)?;

    let jar = store_oidc_cookies(jar, &csrf_token, verifier.secret(), server_id);

    info!(server_id, "dispatching OIDC redirect");
    Ok((jar, Redirect::temporary(auth_url.as_str())))
}

/// GET /auth/callback -> exchanges the code and stores the server's tokens.
pub async fn oidc_callback(
    State(state): State<DeskState>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> Response {
    let (session, jar) = match load_oidc_session(jar) {
        Ok(data) => data,
        Err((jar, err)) => return respond_with_error(jar, err),
    };

    if let Some(error) = query.error.as_deref() {
        let detail = query.error_description.as_deref().unwrap_or("");
        return respond_with_error(
            jar,
            DeskError::OauthFlow(format!("identity provider returned {error}: {detail}")),
        );
    }

    let Some(state_param) = query.state.as_deref() else {
        return respond_with_error(
            jar,
            DeskError::OauthFlow("missing `state` in callback".to_string()),
        );
    };
    if !bool::from(state_param.as_bytes().ct_eq(session.csrf.as_bytes())) {
        return respond_with_error(jar, DeskError::OauthFlow("CSRF token mismatch".to_string()));
    }

    let Some(code) = query.code.as_deref() else {
        return respond_with_error(
            jar,
            DeskError::OauthFlow("missing `code` in callback".to_string()),
        );
    };

    let server = match state.store.get_server(session.server_id).await {
        Ok(server) => server,
        Err(err) => return respond_with_error(jar, err),
    };
    let settings = match OidcSettings::from_server(&server) {
        Ok(settings) => settings,
        Err(err) => return respond_with_error(jar, err),
    };
    let redirect = match callback_url(&state) {
        Ok(url) => url,
        Err(err) => return respond_with_error(jar, err),
    };

    let tokens = match settings
        .exchange_code(
            &redirect,
            AuthorizationCode::new(code.to_owned()),
            PkceCodeVerifier::new(session.pkce_verifier),
            state.alfresco.http(),
        )
        .await
    {
        Ok(tokens) => tokens,
        Err(err) => return respond_with_error(jar, err),
    };
    if tokens.refresh_token.is_none() {
        tracing::warn!(
            server_id = server.id,
            "token response has no refresh_token; the session ends when the access token expires"
        );
    }
    let username = tokens.username.clone();
    if let Err(err) = state.store.store_server_tokens(server.id, tokens).await {
        return respond_with_error(jar, err);
    }

    info!(server_id = server.id, "OIDC callback stored tokens");
    let who = username.unwrap_or_else(|| "your account".to_string());
    (
        jar,
        landing_page(
            "Signed in",
            &format!("Signed in to {} as {}. You can close this window.", server.name, who),
        ),
    )
        .into_response()
}

fn callback_url(state: &DeskState) -> Result<Url, DeskError> {
    Ok(state.local_base.join("auth/callback")?)
}

fn store_oidc_cookies(
    jar: PrivateCookieJar,
    csrf: &CsrfToken,
    pkce_verifier: &str,
    server_id: i64,
) -> PrivateCookieJar {
    jar.add(build_cookie(CSRF_COOKIE, csrf.secret().to_string()))
        .add(build_cookie(PKCE_COOKIE, pkce_verifier.to_string()))
        .add(build_cookie(SERVER_COOKIE, server_id.to_string()))
}

fn load_oidc_session(
    jar: PrivateCookieJar,
) -> Result<(OidcSession, PrivateCookieJar), (PrivateCookieJar, DeskError)> {
    let csrf = jar.get(CSRF_COOKIE).map(|c| c.value().to_owned());
    let pkce_verifier = jar.get(PKCE_COOKIE).map(|c| c.value().to_owned());
    let server_id = jar
        .get(SERVER_COOKIE)
        .and_then(|c| c.value().parse::<i64>().ok());
    let jar = clear_oidc_cookies(jar);

    match (csrf, pkce_verifier, server_id) {
        (Some(csrf), Some(pkce_verifier), Some(server_id)) => Ok((
            OidcSession {
                csrf,
                pkce_verifier,
                server_id,
            },
            jar,
        )),
        _ => Err((
            jar,
            DeskError::OauthFlow("sign-in session expired or missing; start again".to_string()),
        )),
    }
}

fn clear_oidc_cookies(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(CSRF_COOKIE))
        .remove(clear_cookie(PKCE_COOKIE))
        .remove(clear_cookie(SERVER_COOKIE))
}

fn build_cookie(name: &str, value: String) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn respond_with_error(jar: PrivateCookieJar, err: DeskError) -> Response {
    let status = err.code().status();
    tracing::warn!(error = %err, "OIDC sign-in failed");
    let page = landing_page("Sign-in failed", &err.public_message());
    (status, jar, page).into_response()
}

fn landing_page(title: &str, message: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h1>{title}</h1><p>{}</p></body></html>",
        escape_html(message)
    ))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landing_page_escapes_messages() {
        let Html(page) = landing_page("Sign-in failed", "<script>x</script>");
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }
}

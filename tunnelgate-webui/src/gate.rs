//! Session gate shared by every protected endpoint

use axum::http::{header, HeaderMap};

use tunnelgate_core::Auth;

use crate::error::WebError;
use crate::state::AppState;

/// Cookie carrying the session token
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Authorized,
    /// No session cookie
    Unauthenticated,
    /// Session cookie rejected by [`Auth::authorized`]
    Forbidden,
}

/// How a protected endpoint answers a request without a session cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDenied {
    /// Render the login view (401)
    LoginPage,
    /// Plain text 401
    PlainText,
}

/// Value of cookie `name` from the request's `Cookie` header(s)
pub fn extract_token(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.trim_matches('"').to_string())
        })
}

pub fn check_access(auth: &dyn Auth, headers: &HeaderMap) -> Access {
    match extract_token(headers, ACCESS_TOKEN_COOKIE) {
        None => Access::Unauthenticated,
        Some(token) if auth.authorized(&token) => Access::Authorized,
        Some(_) => Access::Forbidden,
    }
}

/// Ok only for an authorized request; otherwise the error to answer with
pub fn require_access(
    state: &AppState,
    headers: &HeaderMap,
    on_denied: OnDenied,
) -> Result<(), WebError> {
    match check_access(state.auth.as_ref(), headers) {
        Access::Authorized => Ok(()),
        Access::Forbidden => Err(WebError::Forbidden),
        Access::Unauthenticated => match on_denied {
            OnDenied::LoginPage => Err(WebError::LoginRequired(state.templates.render_login()?)),
            OnDenied::PlainText => Err(WebError::Unauthenticated),
        },
    }
}

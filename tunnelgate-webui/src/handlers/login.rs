//! Magic-link login
//!
//! - `POST /login` with `email`: ask [`Auth::login`](tunnelgate_core::Auth::login)
//!   to send a link, without waiting for it
//! - `GET /login?key=...`: the link itself; exchanges the key for a session cookie

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, Method},
    response::{IntoResponse, Redirect, Response},
};

use crate::error::WebError;
use crate::form::FormValues;
use crate::gate::ACCESS_TOKEN_COOKIE;
use crate::state::AppState;

pub async fn login(
    State(state): State<AppState>,
    method: Method,
    form: FormValues,
) -> Result<Response, WebError> {
    match method {
        Method::GET => verify_link(&state, &form),
        Method::POST => request_link(&state, &form),
        _ => Err(WebError::MethodNotAllowed("Invalid method for login")),
    }
}

fn verify_link(state: &AppState, form: &FormValues) -> Result<Response, WebError> {
    let key = form
        .query_first("key")
        .ok_or_else(|| WebError::BadRequest("Must provide key for verification".to_string()))?;

    let token = state.auth.verify(key).map_err(|e| {
        tracing::info!("Login key rejected: {}", e);
        WebError::BadRequest("Invalid key".to_string())
    })?;

    Ok((
        [(header::SET_COOKIE, session_cookie(&token))],
        Redirect::temporary("/"),
    )
        .into_response())
}

fn request_link(state: &AppState, form: &FormValues) -> Result<Response, WebError> {
    let email = form
        .first("email")
        .ok_or_else(|| WebError::BadRequest("Email required for login".to_string()))?
        .to_string();

    // Sending can take a while; the client is never told how it went
    let auth = Arc::clone(&state.auth);
    let config = Arc::clone(&state.config);
    tokio::task::spawn_blocking(move || {
        if let Err(e) = auth.login(&email, &config) {
            tracing::warn!(%email, "Login link not sent: {}", e);
        }
    });

    Ok("Check your email to finish logging in".into_response())
}

fn session_cookie(token: &str) -> String {
    format!("{ACCESS_TOKEN_COOKIE}={token}; Path=/; Secure; HttpOnly")
}

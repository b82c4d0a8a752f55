//! Tunnel creation and two-step deletion
//!
//! Deletion is a confirmation page followed by a separate commit request.
//! The two are tied together only by the `domain` the client sends back;
//! nothing is recorded between them.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::Method,
    response::{Html, IntoResponse, Redirect, Response},
};

use super::blocking;
use crate::error::WebError;
use crate::form::FormValues;
use crate::gate::{require_access, OnDenied};
use crate::state::AppState;
use crate::templates::url_with_domain;

/// `/tunnels`: only POST (create) is supported
pub async fn tunnels(State(state): State<AppState>, req: Request) -> Result<Response, WebError> {
    require_access(&state, req.headers(), OnDenied::PlainText)?;

    let method = req.method().clone();
    match method {
        Method::POST => create_tunnel(&state, FormValues::read(req).await?).await,
        _ => Err(WebError::MethodNotAllowed("Invalid method for /tunnels")),
    }
}

async fn create_tunnel(state: &AppState, form: FormValues) -> Result<Response, WebError> {
    let domain = single_param(&form, "domain")?.to_string();
    let client_name = single_param(&form, "client-name")?.to_string();
    let client_port: u16 = single_param(&form, "client-port")?
        .parse()
        .map_err(|_| invalid_param("client-port"))?;

    tracing::debug!(%domain, %client_name, client_port, "Creating tunnel");
    let tunnels = Arc::clone(&state.tunnels);
    blocking(move || tunnels.create_tunnel_for_client(&domain, &client_name, client_port))
        .await?
        .map_err(|e| WebError::BadRequest(e.to_string()))?;

    Ok(Redirect::to("/").into_response())
}

/// Confirmation page for deleting a tunnel. Changes nothing.
pub async fn confirm_delete_tunnel(
    State(state): State<AppState>,
    form: FormValues,
) -> Result<Html<String>, WebError> {
    let domain = single_param(&form, "domain")?;

    let message = format!("Are you sure you want to delete {domain}?");
    let confirm_url = url_with_domain("/delete-tunnel", domain);

    Ok(Html(
        state
            .templates
            .render_confirm(&message, &confirm_url, "/")?,
    ))
}

/// Commit a confirmed deletion
pub async fn delete_tunnel(
    State(state): State<AppState>,
    req: Request,
) -> Result<Redirect, WebError> {
    require_access(&state, req.headers(), OnDenied::PlainText)?;

    let form = FormValues::read(req).await?;
    let domain = single_param(&form, "domain")?.to_string();
    let tunnels = Arc::clone(&state.tunnels);
    blocking(move || tunnels.delete_tunnel(&domain)).await?;

    Ok(Redirect::temporary("/"))
}

fn single_param<'a>(form: &'a FormValues, name: &str) -> Result<&'a str, WebError> {
    form.single(name).ok_or_else(|| invalid_param(name))
}

fn invalid_param(name: &str) -> WebError {
    WebError::BadRequest(format!("Invalid {name} parameter"))
}

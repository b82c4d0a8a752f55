//! HTTP routing
//!
//! | Path | Auth | Handler |
//! |---|---|---|
//! | `/login` | none | [`login::login`] |
//! | `/` | session, else login page | [`index`] |
//! | `/tunnels` | session | [`tunnels::tunnels`] |
//! | `/confirm-delete-tunnel` | none | [`tunnels::confirm_delete_tunnel`] |
//! | `/delete-tunnel` | session | [`tunnels::delete_tunnel`] |
//! | anything else | none | 400 "Invalid endpoint" |

pub mod login;
pub mod tunnels;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    response::Html,
    routing::any,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::error::WebError;
use crate::gate::{require_access, OnDenied};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", any(index))
        .route("/login", any(login::login))
        .route("/tunnels", any(tunnels::tunnels))
        .route("/confirm-delete-tunnel", any(tunnels::confirm_delete_tunnel))
        .route("/delete-tunnel", any(tunnels::delete_tunnel))
        .fallback(invalid_endpoint)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Landing page: tunnel list, or the login form without a session
pub async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Html<String>, WebError> {
    require_access(&state, &headers, OnDenied::LoginPage)?;

    let db = Arc::clone(&state.db);
    let tunnels = blocking(move || db.get_tunnels()).await?;
    Ok(Html(state.templates.render_index(&tunnels)?))
}

/// Run a synchronous collaborator call on the blocking pool
///
/// The request still waits for it, but other requests on the same worker
/// thread keep running while it does file I/O.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, WebError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await?)
}

async fn invalid_endpoint() -> WebError {
    WebError::BadRequest("Invalid endpoint".to_string())
}

//! Request failures and their HTTP responses
//!
//! Every failure is turned into a response where it is detected. Bodies are
//! plain text except for the login page served on an unauthenticated `/`.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebError {
    /// Missing or malformed input, or a rejected tunnel operation (400)
    #[error("{0}")]
    BadRequest(String),

    /// No session cookie (401, plain text)
    #[error("No token provided")]
    Unauthenticated,

    /// No session cookie on the landing page (401, rendered login view)
    #[error("Login required")]
    LoginRequired(String),

    /// Session cookie present but rejected (403)
    #[error("Not authorized")]
    Forbidden,

    #[error("{0}")]
    MethodNotAllowed(&'static str),

    #[error("Failed to render page")]
    Render(#[from] minijinja::Error),

    /// A collaborator call panicked off the request task (500)
    #[error("Internal error")]
    Internal(#[from] tokio::task::JoinError),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Unauthenticated | WebError::LoginRequired(_) => StatusCode::UNAUTHORIZED,
            WebError::Forbidden => StatusCode::FORBIDDEN,
            WebError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            WebError::Render(_) | WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            WebError::LoginRequired(page) => (status, Html(page)).into_response(),
            WebError::Render(e) => {
                tracing::error!("Template render failed: {:#}", e);
                (status, "Failed to render page").into_response()
            }
            WebError::Internal(e) => {
                tracing::error!("Collaborator task failed: {}", e);
                (status, "Internal error").into_response()
            }
            other => (status, other.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            WebError::BadRequest("Invalid endpoint".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(WebError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            WebError::LoginRequired(String::new()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(WebError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            WebError::MethodNotAllowed("Invalid method for login").status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn test_messages_are_client_text() {
        assert_eq!(WebError::Forbidden.to_string(), "Not authorized");
        assert_eq!(WebError::Unauthenticated.to_string(), "No token provided");
        assert_eq!(
            WebError::BadRequest("Invalid key".into()).to_string(),
            "Invalid key"
        );
    }
}

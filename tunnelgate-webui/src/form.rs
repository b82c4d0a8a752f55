//! Form value extraction
//!
//! Values come from a URL-encoded body (POST, PUT and PATCH only) followed
//! by the URL query, so a field counts as single only when it appears once
//! across both.

use axum::{
    extract::{FromRequest, Request},
    http::{header, HeaderMap, Method},
};
use url::form_urlencoded;

use crate::error::WebError;

/// Largest accepted form body
pub const MAX_FORM_BYTES: usize = 10 << 20;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Default, Clone)]
pub struct FormValues {
    body: Vec<(String, String)>,
    query: Vec<(String, String)>,
}

impl FormValues {
    pub fn from_parts(query: Option<&str>, body: &[u8]) -> Self {
        Self {
            body: decode(body),
            query: query.map(|q| decode(q.as_bytes())).unwrap_or_default(),
        }
    }

    /// Every value of `name`, body values first
    pub fn values<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a str> {
        self.body
            .iter()
            .chain(self.query.iter())
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The value of `name` if it has exactly one
    pub fn single(&self, name: &str) -> Option<&str> {
        let mut values = self.values(name);
        match (values.next(), values.next()) {
            (Some(value), None) => Some(value),
            _ => None,
        }
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).next()
    }

    /// First value of `name` in the URL query, ignoring the body
    pub fn query_first(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

fn decode(input: &[u8]) -> Vec<(String, String)> {
    form_urlencoded::parse(input).into_owned().collect()
}

fn has_form_body(method: &Method, headers: &HeaderMap) -> bool {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE));

    is_form && matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

impl FormValues {
    /// Decode the query and, for form posts, the body of `req`
    ///
    /// Protected handlers call this after the session check so that
    /// unauthenticated bodies are never buffered.
    pub async fn read(req: Request) -> Result<Self, WebError> {
        let query = req.uri().query().map(str::to_owned);

        let body = if has_form_body(req.method(), req.headers()) {
            axum::body::to_bytes(req.into_body(), MAX_FORM_BYTES)
                .await
                .map_err(|e| {
                    tracing::debug!("Failed to read form body: {}", e);
                    WebError::BadRequest("Invalid form body".to_string())
                })?
        } else {
            Default::default()
        };

        Ok(Self::from_parts(query.as_deref(), &body))
    }
}

impl<S> FromRequest<S> for FormValues
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        Self::read(req).await
    }
}

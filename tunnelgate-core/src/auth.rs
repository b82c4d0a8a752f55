//! Magic-link authentication for tunnelgate
//!
//! Two kinds of signed JWT:
//! - Login key: short-lived (15 min), single use, delivered out of band as a link
//! - Access token: long-lived (30 days), carried in the `access_token` cookie
//!
//! The web layer only sees the [`Auth`] trait; [`MagicLinkAuth`] is the
//! default implementation.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

/// Session and login-link authority consumed by the web interface
pub trait Auth: Send + Sync {
    /// Whether `token` is a valid session token
    fn authorized(&self, token: &str) -> bool;

    /// Exchange a login key for a session token
    fn verify(&self, key: &str) -> Result<String, AuthError>;

    /// Issue a login key for `email` and deliver it as a link.
    /// May block for as long as delivery takes.
    fn login(&self, email: &str, config: &Config) -> Result<(), AuthError>;
}

/// Delivers a login link to its recipient
pub trait LinkSender: Send + Sync {
    fn send_link(&self, email: &str, link: &str) -> Result<(), AuthError>;
}

/// Writes login links to the log instead of mailing them
#[derive(Debug, Default)]
pub struct LogLinkSender;

impl LinkSender for LogLinkSender {
    fn send_link(&self, email: &str, link: &str) -> Result<(), AuthError> {
        tracing::info!(%email, %link, "Login link issued");
        Ok(())
    }
}

/// Appends one `<email> <link>` line per login link to a file
///
/// Lets an operator hand links out without a mail relay.
#[derive(Debug)]
pub struct FileLinkSender {
    path: PathBuf,
    /// Keeps lines from concurrent logins whole
    lock: Mutex<()>,
}

impl FileLinkSender {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl LinkSender for FileLinkSender {
    fn send_link(&self, email: &str, link: &str) -> Result<(), AuthError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AuthError::DeliveryFailed(format!("{}: {}", self.path.display(), e)))?;
        writeln!(file, "{email} {link}")
            .map_err(|e| AuthError::DeliveryFailed(format!("{}: {}", self.path.display(), e)))?;

        tracing::info!(%email, path = %self.path.display(), "Login link written");
        Ok(())
    }
}

/// JWT claims embedded in keys and tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (email)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Token type (login key or access)
    pub token_type: TokenType,
    /// Random nonce, makes every key distinct
    pub jti: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    LoginKey,
    Access,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token encoding failed: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token type: expected {expected:?}, got {got:?}")]
    InvalidTokenType { expected: TokenType, got: TokenType },

    #[error("Login key has already been used")]
    KeyAlreadyUsed,

    #[error("Email is not allowed to log in: {0}")]
    EmailNotAllowed(String),

    #[error("Failed to deliver login link: {0}")]
    DeliveryFailed(String),
}

/// Default [`Auth`]: stateless session tokens, single-use login keys
pub struct MagicLinkAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    login_key_ttl: u64,    // seconds
    access_token_ttl: u64, // seconds
    /// jti -> exp of keys already exchanged
    redeemed: Mutex<HashMap<String, u64>>,
    sender: Box<dyn LinkSender>,
}

impl MagicLinkAuth {
    /// Create new magic-link auth handler
    ///
    /// # Arguments
    /// * `secret` - HMAC secret for signing tokens (should be >= 32 bytes)
    /// * `login_key_ttl` - Login key lifetime in seconds (default: 900 = 15 min)
    /// * `access_token_ttl` - Session lifetime in seconds (default: 2592000 = 30 days)
    pub fn new(secret: &[u8], login_key_ttl: Option<u64>, access_token_ttl: Option<u64>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            login_key_ttl: login_key_ttl.unwrap_or(900),
            access_token_ttl: access_token_ttl.unwrap_or(2_592_000),
            redeemed: Mutex::new(HashMap::new()),
            sender: Box::new(LogLinkSender),
        }
    }

    /// Replace the link delivery mechanism
    pub fn with_sender(mut self, sender: impl LinkSender + 'static) -> Self {
        self.sender = Box::new(sender);
        self
    }

    /// Sign a login key for `email`
    pub fn issue_login_key(&self, email: &str) -> Result<String, AuthError> {
        self.issue(email, TokenType::LoginKey, self.login_key_ttl)
    }

    /// Sign a session token for `email`
    pub fn issue_access_token(&self, email: &str) -> Result<String, AuthError> {
        self.issue(email, TokenType::Access, self.access_token_ttl)
    }

    /// Verify and decode an access token
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.decode_typed(token, TokenType::Access)
    }

    fn issue(&self, email: &str, token_type: TokenType, ttl: u64) -> Result<String, AuthError> {
        let now = now_secs();
        let claims = Claims {
            sub: email.to_string(),
            exp: now + ttl,
            iat: now,
            token_type,
            jti: generate_nonce(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    fn decode_typed(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let claims = self.decode_token(token)?;

        if claims.token_type != expected {
            return Err(AuthError::InvalidTokenType {
                expected,
                got: claims.token_type,
            });
        }

        Ok(claims)
    }

    /// Decode and validate a token
    fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        if token_data.claims.exp < now_secs() {
            return Err(AuthError::TokenExpired);
        }

        Ok(token_data.claims)
    }

    /// Record `claims` as redeemed, failing if it already was
    fn redeem(&self, claims: &Claims) -> Result<(), AuthError> {
        let now = now_secs();
        let mut redeemed = self.redeemed.lock().unwrap_or_else(|e| e.into_inner());

        // Expired keys can no longer be presented, forget them
        redeemed.retain(|_, exp| *exp >= now);

        if redeemed.contains_key(&claims.jti) {
            return Err(AuthError::KeyAlreadyUsed);
        }
        redeemed.insert(claims.jti.clone(), claims.exp);
        Ok(())
    }
}

impl Auth for MagicLinkAuth {
    fn authorized(&self, token: &str) -> bool {
        match self.verify_access_token(token) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Rejected access token: {}", e);
                false
            }
        }
    }

    fn verify(&self, key: &str) -> Result<String, AuthError> {
        let claims = self.decode_typed(key, TokenType::LoginKey)?;
        self.redeem(&claims)?;

        tracing::info!(email = %claims.sub, "Login key redeemed");
        self.issue_access_token(&claims.sub)
    }

    fn login(&self, email: &str, config: &Config) -> Result<(), AuthError> {
        if !config.server.email_allowed(email) {
            return Err(AuthError::EmailNotAllowed(email.to_string()));
        }

        let key = self.issue_login_key(email)?;
        let link = format!("https://{}/login?key={}", config.server.admin_domain, key);
        self.sender.send_link(email, &link)
    }
}

/// Generate a secure random secret for token signing
pub fn generate_secret() -> [u8; 32] {
    use rand::Rng;
    rand::thread_rng().r#gen()
}

fn generate_nonce() -> String {
    use rand::Rng;
    format!("{:032x}", rand::thread_rng().r#gen::<u128>())
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

//! tunnelgate-core: Shared library for the tunnel admin interface
//!
//! This crate provides:
//! - Magic-link authentication (login keys, session tokens)
//! - Tunnel record storage
//! - Tunnel creation and deletion
//! - Configuration

pub mod auth;
pub mod config;
pub mod db;
pub mod tunnels;

pub use auth::{Auth, AuthError, FileLinkSender, LinkSender, MagicLinkAuth};
pub use config::Config;
pub use db::{Database, JsonDatabase, Tunnel};
pub use tunnels::{LocalTunnelManager, TunnelError, TunnelManager};

/// Default HTTP port for the admin interface
pub const DEFAULT_ADMIN_PORT: u16 = 9290;

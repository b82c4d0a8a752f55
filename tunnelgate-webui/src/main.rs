//! tunnelgate-webui: administrative web interface for tunnels
//!
//! Serves a small HTML UI that:
//! - Logs admins in with magic links (session token in an `access_token` cookie)
//! - Lists tunnels and creates new ones
//! - Deletes tunnels behind a confirmation page

mod error;
mod form;
mod gate;
mod handlers;
mod state;
mod templates;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use base64::Engine;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tunnelgate_core::{
    Config, Database, FileLinkSender, JsonDatabase, LocalTunnelManager, MagicLinkAuth,
};

use crate::state::AppState;
use crate::templates::{AssetSource, Templates};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "tunnelgate_webui=debug,tunnelgate_core=info,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let mut config = Config::load().context("Failed to load config")?;

    // Initialize auth
    let secret = match config.server.token_secret {
        Some(ref secret) => base64::engine::general_purpose::STANDARD
            .decode(secret)
            .context("Invalid token_secret (must be base64)")?,
        None => {
            let secret = tunnelgate_core::auth::generate_secret();
            config.server.token_secret =
                Some(base64::engine::general_purpose::STANDARD.encode(secret));

            // Keep sessions valid across restarts when the config is writable
            match config.save() {
                Ok(()) => tracing::info!("Generated token secret and saved it to the config file"),
                Err(e) => tracing::warn!(
                    "Generated random token secret, not saved ({}); sessions end on restart",
                    e
                ),
            }
            secret.to_vec()
        }
    };

    let server = &config.server;
    let mut auth = MagicLinkAuth::new(
        &secret,
        Some(server.login_key_ttl),
        Some(server.access_token_ttl),
    );
    if let Some(path) = &server.login_link_file {
        tracing::info!("Login links are written to {}", path.display());
        auth = auth.with_sender(FileLinkSender::new(path));
    }

    // Tunnel storage
    let db: Arc<dyn Database> = match &server.db_path {
        Some(path) => Arc::new(
            JsonDatabase::open(path)
                .with_context(|| format!("Failed to open database {}", path.display()))?,
        ),
        None => {
            tracing::warn!("No db_path configured, tunnels are kept in memory only");
            Arc::new(JsonDatabase::in_memory())
        }
    };

    anyhow::ensure!(
        server.tunnel_port_start <= server.tunnel_port_end,
        "tunnel_port_start must not exceed tunnel_port_end"
    );
    let tunnels = LocalTunnelManager::new(
        Arc::clone(&db),
        server.tunnel_port_start..=server.tunnel_port_end,
    );

    // Views are compiled once; the server does not start without them
    let assets = match &server.assets_dir {
        Some(dir) => AssetSource::Directory(dir.clone()),
        None => AssetSource::Bundled,
    };
    let templates = Templates::load(&assets).context("Failed to load web UI assets")?;

    let addr = SocketAddr::from((
        server.listen_addr.parse::<std::net::IpAddr>()?,
        server.port,
    ));
    tracing::info!(admin_domain = %server.admin_domain, "Admin UI configured");

    let state = AppState::new(
        config,
        db,
        Arc::new(auth),
        Arc::new(tunnels),
        templates,
    );
    let app = handlers::router(state);

    // Start server
    tracing::info!("tunnelgate-webui listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

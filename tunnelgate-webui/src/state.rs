//! Shared server state

use std::sync::Arc;

use tunnelgate_core::{Auth, Config, Database, TunnelManager};

use crate::templates::Templates;

/// Everything a request handler needs. Built once at startup and never
/// mutated afterwards, so clones are shared without locking.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Tunnel records shown on the index page
    pub db: Arc<dyn Database>,

    /// Session tokens and login links
    pub auth: Arc<dyn Auth>,

    /// Tunnel creation and deletion
    pub tunnels: Arc<dyn TunnelManager>,

    pub templates: Arc<Templates>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Arc<dyn Database>,
        auth: Arc<dyn Auth>,
        tunnels: Arc<dyn TunnelManager>,
        templates: Templates,
    ) -> Self {
        Self {
            config: Arc::new(config),
            db,
            auth,
            tunnels,
            templates: Arc::new(templates),
        }
    }
}

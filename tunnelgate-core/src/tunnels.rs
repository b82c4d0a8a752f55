//! Tunnel lifecycle bookkeeping
//!
//! [`LocalTunnelManager`] validates requests, allocates a server-side port
//! and records the tunnel. Opening and proxying the traffic path happens
//! elsewhere.

use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use thiserror::Error;

use crate::db::{Database, DbError, Tunnel};

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("Domain must not be empty")]
    InvalidDomain,

    #[error("Client name must not be empty")]
    InvalidClientName,

    #[error("Tunnel for {0} already exists")]
    DomainTaken(String),

    #[error("No free tunnel ports left")]
    NoFreePorts,

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

/// Creates and removes tunnels on behalf of the web interface
pub trait TunnelManager: Send + Sync {
    fn create_tunnel_for_client(
        &self,
        domain: &str,
        client_name: &str,
        client_port: u16,
    ) -> Result<Tunnel, TunnelError>;

    /// Remove the tunnel for `domain`. Unknown domains are ignored.
    fn delete_tunnel(&self, domain: &str);
}

/// Default [`TunnelManager`] backed by a [`Database`]
pub struct LocalTunnelManager {
    db: Arc<dyn Database>,
    ports: RangeInclusive<u16>,
    /// Serializes check-allocate-insert so two creates never share a port
    create_lock: Mutex<()>,
}

impl LocalTunnelManager {
    pub fn new(db: Arc<dyn Database>, ports: RangeInclusive<u16>) -> Self {
        Self {
            db,
            ports,
            create_lock: Mutex::new(()),
        }
    }

    /// Lowest port in range not held by an existing tunnel
    fn allocate_port(&self) -> Option<u16> {
        let used: HashSet<u16> = self
            .db
            .get_tunnels()
            .values()
            .map(|t| t.tunnel_port)
            .collect();

        self.ports.clone().find(|port| !used.contains(port))
    }
}

impl TunnelManager for LocalTunnelManager {
    fn create_tunnel_for_client(
        &self,
        domain: &str,
        client_name: &str,
        client_port: u16,
    ) -> Result<Tunnel, TunnelError> {
        if domain.trim().is_empty() {
            return Err(TunnelError::InvalidDomain);
        }
        if client_name.trim().is_empty() {
            return Err(TunnelError::InvalidClientName);
        }

        let _guard = self.create_lock.lock().unwrap_or_else(|e| e.into_inner());

        if self.db.get_tunnel(domain).is_some() {
            return Err(TunnelError::DomainTaken(domain.to_string()));
        }

        let tunnel_port = self.allocate_port().ok_or(TunnelError::NoFreePorts)?;
        let tunnel = Tunnel {
            domain: domain.to_string(),
            client_name: client_name.to_string(),
            client_port,
            tunnel_port,
            created_at: Utc::now(),
        };
        self.db.set_tunnel(tunnel.clone())?;

        tracing::info!(
            domain,
            client_name,
            client_port,
            tunnel_port,
            "Tunnel created"
        );
        Ok(tunnel)
    }

    fn delete_tunnel(&self, domain: &str) {
        match self.db.delete_tunnel(domain) {
            Ok(Some(tunnel)) => {
                tracing::info!(domain, tunnel_port = tunnel.tunnel_port, "Tunnel deleted")
            }
            Ok(None) => tracing::debug!(domain, "Delete requested for unknown tunnel"),
            Err(e) => tracing::error!(domain, "Failed to delete tunnel: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::JsonDatabase;

    fn manager(ports: RangeInclusive<u16>) -> (LocalTunnelManager, Arc<JsonDatabase>) {
        let db = Arc::new(JsonDatabase::in_memory());
        (LocalTunnelManager::new(db.clone(), ports), db)
    }

    #[test]
    fn test_create_allocates_lowest_free_port() {
        let (tunnels, db) = manager(9300..=9309);

        let a = tunnels
            .create_tunnel_for_client("a.example.com", "laptop", 8080)
            .unwrap();
        let b = tunnels
            .create_tunnel_for_client("b.example.com", "laptop", 3000)
            .unwrap();
        assert_eq!((a.tunnel_port, b.tunnel_port), (9300, 9301));
        assert_eq!(b.client_port, 3000);

        // Freed port is reused
        tunnels.delete_tunnel("a.example.com");
        let c = tunnels
            .create_tunnel_for_client("c.example.com", "desktop", 22)
            .unwrap();
        assert_eq!(c.tunnel_port, 9300);
        assert_eq!(db.get_tunnels().len(), 2);
    }

    #[test]
    fn test_duplicate_domain_rejected() {
        let (tunnels, _) = manager(9300..=9309);
        tunnels
            .create_tunnel_for_client("a.example.com", "laptop", 8080)
            .unwrap();

        let err = tunnels
            .create_tunnel_for_client("a.example.com", "desktop", 9090)
            .unwrap_err();
        assert!(matches!(err, TunnelError::DomainTaken(_)));
        assert_eq!(err.to_string(), "Tunnel for a.example.com already exists");
    }

    #[test]
    fn test_port_range_exhausted() {
        let (tunnels, _) = manager(9300..=9300);
        tunnels
            .create_tunnel_for_client("a.example.com", "laptop", 8080)
            .unwrap();

        assert!(matches!(
            tunnels.create_tunnel_for_client("b.example.com", "laptop", 8081),
            Err(TunnelError::NoFreePorts)
        ));
    }

    #[test]
    fn test_empty_fields_rejected() {
        let (tunnels, db) = manager(9300..=9309);

        assert!(matches!(
            tunnels.create_tunnel_for_client("", "laptop", 8080),
            Err(TunnelError::InvalidDomain)
        ));
        assert!(matches!(
            tunnels.create_tunnel_for_client("a.example.com", " ", 8080),
            Err(TunnelError::InvalidClientName)
        ));
        assert!(db.get_tunnels().is_empty());
    }

    #[test]
    fn test_failed_store_does_not_claim_domain() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let db = Arc::new(JsonDatabase::open(blocker.join("tunnels.json")).unwrap());
        let tunnels = LocalTunnelManager::new(db.clone(), 9300..=9309);

        for _ in 0..2 {
            assert!(matches!(
                tunnels.create_tunnel_for_client("a.example.com", "laptop", 8080),
                Err(TunnelError::Storage(_))
            ));
        }
        assert!(db.get_tunnels().is_empty());
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let (tunnels, db) = manager(9300..=9309);
        tunnels.delete_tunnel("missing.example.com");
        assert!(db.get_tunnels().is_empty());
    }

    #[test]
    fn test_concurrent_creates_get_distinct_ports() {
        let (tunnels, db) = manager(9300..=9399);
        let tunnels = Arc::new(tunnels);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tunnels = Arc::clone(&tunnels);
                std::thread::spawn(move || {
                    tunnels
                        .create_tunnel_for_client(&format!("t{i}.example.com"), "laptop", 8080)
                        .unwrap()
                        .tunnel_port
                })
            })
            .collect();

        let ports: HashSet<u16> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ports.len(), 8);
        assert_eq!(db.get_tunnels().len(), 8);
    }
}

//! Tunnel record storage
//!
//! Records live in memory and, when a path is configured, are written back
//! to a JSON file after every change.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A tunnel exposing a client's local service under a public domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunnel {
    pub domain: String,
    pub client_name: String,
    /// Port of the service on the client machine
    pub client_port: u16,
    /// Server-side port allocated to this tunnel
    pub tunnel_port: u16,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Failed to access database file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode database: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tunnel record store consumed by the web interface and tunnel manager
pub trait Database: Send + Sync {
    /// Snapshot of every tunnel, keyed by domain
    fn get_tunnels(&self) -> BTreeMap<String, Tunnel>;

    fn get_tunnel(&self, domain: &str) -> Option<Tunnel>;

    /// Insert or replace the record for `tunnel.domain`
    fn set_tunnel(&self, tunnel: Tunnel) -> Result<(), DbError>;

    /// Remove a record, returning it if it existed
    fn delete_tunnel(&self, domain: &str) -> Result<Option<Tunnel>, DbError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DbFile {
    #[serde(default)]
    tunnels: BTreeMap<String, Tunnel>,
}

/// Default [`Database`], optionally backed by a JSON file
#[derive(Debug, Default)]
pub struct JsonDatabase {
    path: Option<PathBuf>,
    data: RwLock<DbFile>,
}

impl JsonDatabase {
    /// Database that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load `path` if it exists, otherwise start empty and create it on first write
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DbError> {
        let path = path.into();

        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            DbFile::default()
        };

        tracing::info!(
            "Loaded {} tunnel(s) from {}",
            data.tunnels.len(),
            path.display()
        );

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, DbFile> {
        self.data.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, DbFile> {
        self.data.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Called with the write lock held so the file never interleaves
    fn persist(&self, data: &DbFile) -> Result<(), DbError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(data)?)?;
        Ok(())
    }
}

impl Database for JsonDatabase {
    fn get_tunnels(&self) -> BTreeMap<String, Tunnel> {
        self.read().tunnels.clone()
    }

    fn get_tunnel(&self, domain: &str) -> Option<Tunnel> {
        self.read().tunnels.get(domain).cloned()
    }

    fn set_tunnel(&self, tunnel: Tunnel) -> Result<(), DbError> {
        let mut data = self.write();
        let mut next = DbFile {
            tunnels: data.tunnels.clone(),
        };
        next.tunnels.insert(tunnel.domain.clone(), tunnel);

        // Memory only changes once the file has the new contents
        self.persist(&next)?;
        *data = next;
        Ok(())
    }

    fn delete_tunnel(&self, domain: &str) -> Result<Option<Tunnel>, DbError> {
        let mut data = self.write();
        if !data.tunnels.contains_key(domain) {
            return Ok(None);
        }

        let mut next = DbFile {
            tunnels: data.tunnels.clone(),
        };
        let removed = next.tunnels.remove(domain);

        self.persist(&next)?;
        *data = next;
        Ok(removed)
    }
}

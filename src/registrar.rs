//! Host validation and connection registration.

use anyhow::Result;

use crate::config::{Config, HostConfig};
use crate::connection::ConnectionRegistry;
use crate::error::RegistrarError;
use crate::uri::ConnectionUri;

pub const FEATURES_ALIAS: &str = "features";
pub const MAPPING_ALIAS: &str = "mapping";

/// Forms connection URIs from `config` and registers them with `registry`.
pub struct Registrar<'a, R: ConnectionRegistry> {
    config: &'a Config,
    registry: &'a mut R,
}

impl<'a, R: ConnectionRegistry> Registrar<'a, R> {
    pub fn new(config: &'a Config, registry: &'a mut R) -> Self {
        Self { config, registry }
    }

    fn host(&self, host_key: &str) -> Result<&'a HostConfig, RegistrarError> {
        self.config
            .host(host_key)
            .ok_or_else(|| RegistrarError::invalid_host(host_key, self.config.host_keys()))
    }

    /// Build the URI `connect` would register, without registering it.
    pub fn uri(&self, host_key: &str, db_name: &str) -> Result<ConnectionUri> {
        let host = self.host(host_key)?;
        if db_name.is_empty() {
            return Err(RegistrarError::EmptyDatabaseName.into());
        }
        ConnectionUri::build(host, db_name)
    }

    /// Register `db_name` on `host_key` under `alias`, or under `db_name` when no alias is given.
    pub fn connect(&mut self, host_key: &str, db_name: &str, alias: Option<&str>) -> Result<()> {
        let uri = self.uri(host_key, db_name)?;
        let alias = alias.filter(|a| !a.is_empty()).unwrap_or(db_name);

        tracing::info!("Registering connection '{}' -> {}", alias, uri);
        self.registry.register(uri, alias, db_name)
    }

    /// Register the features and mapping databases, in that order.
    /// A failure on the second leaves the first registered.
    pub fn initialize(&mut self, host_key: &str) -> Result<()> {
        self.host(host_key)?;

        let config = self.config;
        self.connect(host_key, &config.connections.features.db, Some(FEATURES_ALIAS))?;
        self.connect(host_key, &config.connections.mapping.db, Some(MAPPING_ALIAS))?;

        tracing::info!("Initialized connections for host '{}'", host_key);
        Ok(())
    }
}

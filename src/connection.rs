//! Connection registry.
//! The registrar hands every formed URI to a `ConnectionRegistry`.

use anyhow::Result;
use std::collections::HashMap;

use crate::direct_connection::RegisteredConnection;
use crate::uri::ConnectionUri;

/// Destination for formed connections, keyed by alias.
pub trait ConnectionRegistry {
    fn register(&mut self, uri: ConnectionUri, alias: &str, db_name: &str) -> Result<()>;
}

/// Registry holding all registered connections.
/// Registering an existing alias replaces the earlier connection.
#[derive(Default)]
pub struct ClientRegistry {
    connections: HashMap<String, RegisteredConnection>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    pub fn get(&self, alias: &str) -> Option<&RegisteredConnection> {
        self.connections.get(alias)
    }

    pub fn list_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<_> = self.connections.keys().cloned().collect();
        aliases.sort();
        aliases
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl ConnectionRegistry for ClientRegistry {
    fn register(&mut self, uri: ConnectionUri, alias: &str, db_name: &str) -> Result<()> {
        let conn = RegisteredConnection::new(uri, alias, db_name);
        if self.connections.insert(alias.to_string(), conn).is_some() {
            tracing::debug!("Replaced existing connection '{}'", alias);
        }
        Ok(())
    }
}

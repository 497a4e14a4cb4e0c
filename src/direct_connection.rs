//! A registered MongoDB connection with a lazily created client.

use anyhow::{Context, Result};
use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::uri::ConnectionUri;

/// Connection registered under an alias.
/// No network activity happens until the client is first requested.
pub struct RegisteredConnection {
    alias: String,
    database_name: String,
    uri: ConnectionUri,
    client: OnceCell<Client>,
}

impl RegisteredConnection {
    pub fn new(uri: ConnectionUri, alias: &str, database_name: &str) -> Self {
        Self {
            alias: alias.to_string(),
            database_name: database_name.to_string(),
            uri,
            client: OnceCell::new(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn uri(&self) -> &ConnectionUri {
        &self.uri
    }

    /// Lazily initialize the MongoDB client on first use
    pub async fn client(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                tracing::info!(
                    "Initializing MongoDB client for '{}' ({})",
                    self.alias,
                    self.uri
                );

                let mut client_options = ClientOptions::parse(self.uri.as_str())
                    .await
                    .context("Failed to parse MongoDB connection URI")?;

                client_options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
                client_options.connect_timeout = Some(Duration::from_secs(10));
                client_options.server_selection_timeout = Some(Duration::from_secs(30));

                Client::with_options(client_options).context("Failed to create MongoDB client")
            })
            .await
    }

    pub async fn database(&self) -> Result<Database> {
        Ok(self.client().await?.database(&self.database_name))
    }

    /// Round-trip a `ping` command to the registered database.
    pub async fn ping(&self, timeout_secs: u64) -> Result<()> {
        let db = self.database().await?;

        match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            db.run_command(doc! { "ping": 1 }),
        )
        .await
        {
            Ok(result) => {
                result.with_context(|| format!("Ping failed for connection '{}'", self.alias))?;
                Ok(())
            }
            Err(_) => anyhow::bail!(
                "Ping for connection '{}' timed out after {} seconds",
                self.alias,
                timeout_secs
            ),
        }
    }
}

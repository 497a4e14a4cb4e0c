//! MongoDB connection URI assembly.

use anyhow::Result;
use std::fmt;

use crate::config::HostConfig;

const REDACTED: &str = "****";

/// A connection URI together with a password-free rendering for logs.
/// `Display` and `Debug` only ever show the redacted form.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionUri {
    uri: String,
    redacted: String,
}

impl ConnectionUri {
    /// Build the URI for `db_name` on `host`, resolving the host's password.
    pub fn build(host: &HostConfig, db_name: &str) -> Result<Self> {
        let password = host.resolve_password()?;
        Ok(Self {
            uri: render(host, &urlencoding::encode(&password), db_name),
            redacted: render(host, REDACTED, db_name),
        })
    }

    /// The full URI, credentials included
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    pub fn redacted(&self) -> &str {
        &self.redacted
    }
}

impl fmt::Display for ConnectionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.redacted())
    }
}

impl fmt::Debug for ConnectionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionUri").field(&self.redacted).finish()
    }
}

/// `url` alone, or `url:port` when a port is configured
pub fn network_location(host: &HostConfig) -> String {
    match host.port {
        Some(port) => format!("{}:{}", host.url, port),
        None => host.url.clone(),
    }
}

/// Optional URI parameters in their fixed order: w, retryWrites, authSource.
pub fn query_options(host: &HostConfig) -> Vec<String> {
    let mut options = Vec::new();

    if host.majority {
        options.push("w=majority".to_string());
    }
    if let Some(retry_writes) = host.retry_writes {
        options.push(format!("retryWrites={retry_writes}"));
    }
    if let Some(auth_source) = host.auth_source.as_deref().filter(|s| !s.is_empty()) {
        options.push(format!("authSource={}", urlencoding::encode(auth_source)));
    }

    options
}

/// `password` must already be encoded (or be the redaction marker).
fn render(host: &HostConfig, password: &str, db_name: &str) -> String {
    let mut uri = format!(
        "{}{}:{}@{}/{}",
        host.mongo_base,
        urlencoding::encode(&host.user),
        password,
        network_location(host),
        db_name
    );

    let options = query_options(host);
    if !options.is_empty() {
        uri.push('?');
        uri.push_str(&options.join("&"));
    }

    uri
}

//! Registrar error types.

use thiserror::Error;

/// Errors raised by the registrar itself.
/// Config loading and driver failures travel as plain `anyhow::Error`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrarError {
    #[error("db-host provided '{host}' should be one of [{}]", .valid.join(", "))]
    InvalidHost { host: String, valid: Vec<String> },

    #[error("database name must not be empty")]
    EmptyDatabaseName,
}

impl RegistrarError {
    pub fn invalid_host<'a>(host: &str, valid: impl IntoIterator<Item = &'a str>) -> Self {
        Self::InvalidHost {
            host: host.to_string(),
            valid: valid.into_iter().map(str::to_string).collect(),
        }
    }
}

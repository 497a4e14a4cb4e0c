use anyhow::{Context, Result, bail};
use serde::de::{self, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Expand environment variables and tilde in a path string.
/// Supports: $HOME, ${VAR}, ~/path
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

/// Case-insensitive "true"/"false"; blank means unset.
fn parse_flag_text<E: de::Error>(text: &str) -> std::result::Result<Option<bool>, E> {
    match text.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" => Ok(Some(true)),
        "false" => Ok(Some(false)),
        _ => Err(E::invalid_value(
            Unexpected::Str(text),
            &"a boolean or \"true\"/\"false\"",
        )),
    }
}

/// `retryWrites` is only rendered for a set flag: a boolean `false` leaves the
/// driver default in place, while the string `"false"` renders `retryWrites=false`.
fn deserialize_retry_writes<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Flag>::deserialize(deserializer)? {
        None | Some(Flag::Bool(false)) => Ok(None),
        Some(Flag::Bool(true)) => Ok(Some(true)),
        Some(Flag::Text(text)) => parse_flag_text(&text),
    }
}

/// Accepts a YAML boolean or a case-insensitive "true"/"false" string.
fn deserialize_switch<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(false),
        Some(Flag::Bool(value)) => Ok(value),
        Some(Flag::Text(text)) => Ok(parse_flag_text(&text)?.unwrap_or(false)),
    }
}

/// Accepts an integer or a numeric string; blank, null and 0 mean no port.
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u64),
        Text(String),
    }

    let port = match Option::<Port>::deserialize(deserializer)? {
        None | Some(Port::Number(0)) => return Ok(None),
        Some(Port::Number(n)) => u16::try_from(n)
            .map_err(|_| de::Error::invalid_value(Unexpected::Unsigned(n), &"a port number"))?,
        Some(Port::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<u16>()
                .map_err(|_| de::Error::invalid_value(Unexpected::Str(&text), &"a port number"))?
        }
    };

    Ok((port != 0).then_some(port))
}

/// Connection parameters for one MongoDB cluster.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostConfig {
    /// Scheme prefix, e.g. `mongodb://` or `mongodb+srv://`
    pub mongo_base: String,
    pub url: String,
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<u16>,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the password. Takes precedence over `password`.
    #[serde(default)]
    pub password_env: Option<String>,
    #[serde(default, deserialize_with = "deserialize_switch")]
    pub majority: bool,
    #[serde(default, deserialize_with = "deserialize_retry_writes")]
    pub retry_writes: Option<bool>,
    #[serde(default, alias = "authSource")]
    pub auth_source: Option<String>,
}

impl HostConfig {
    /// Resolve the password, reading `password_env` when configured.
    pub fn resolve_password(&self) -> Result<String> {
        self.resolve_password_with(|var| std::env::var(var).ok())
    }

    /// Like `resolve_password`, with `lookup` standing in for the environment.
    pub fn resolve_password_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
        if let Some(var) = &self.password_env {
            return lookup(var)
                .with_context(|| format!("Password environment variable '{var}' is not set"));
        }

        match &self.password {
            Some(password) => Ok(password.clone()),
            None => bail!("Host has neither 'password' nor 'password_env' configured"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    pub db: String,
}

/// Database names for each logical role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roles {
    pub features: RoleConfig,
    pub mapping: RoleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hosts: BTreeMap<String, HostConfig>,

    pub connections: Roles,
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("mongo-registrar");

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        }

        Ok(config_dir)
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.yaml"))
    }

    /// Load from an explicit path, or from the default location when `None`.
    pub fn load(path: Option<&str>) -> Result<(Self, PathBuf)> {
        let config_file = match path {
            Some(path) => {
                let path = PathBuf::from(expand_path(path));
                if !path.exists() {
                    bail!("Configuration file not found: {}", path.display());
                }
                path
            }
            None => {
                let path = Self::config_file()?;
                if !path.exists() {
                    Self::create_example_config(&path)?;
                    bail!(
                        "Configuration file not found. An example configuration has been created at:\n\
                        {}\n\n\
                        Please edit this file to configure your MongoDB hosts.",
                        path.display()
                    );
                }
                path
            }
        };

        let content = fs::read_to_string(&config_file).context("Failed to read config file")?;
        let config = Self::from_yaml(&content).context("Failed to parse config file")?;

        config.validate();

        Ok((config, config_file))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn create_example_config(config_file: &Path) -> Result<()> {
        let example_content = r#"# mongo-registrar configuration

# Hosts: every key below is a valid host for `connect` and `init`
hosts:
  # Example: MongoDB Atlas (cloud)
  atlas:
    mongo_base: "mongodb+srv://"
    url: cluster0.example.mongodb.net
    user: analyst
    password_env: ATLAS_MONGO_PASSWORD
    majority: true
    retry_writes: true
    auth_source: admin

  # Example: Local development MongoDB
  local:
    mongo_base: "mongodb://"
    url: localhost
    port: 27017
    user: dev
    password: dev

# Database names per logical role, registered by `init`
connections:
  features:
    db: features
  mapping:
    db: mapping

# Configuration notes:
#
# - mongo_base: URI scheme prefix, including "://"
# - url: Cluster host name; port is appended as ":<port>" when given
# - user / password: Credentials, percent-encoded when the URI is built
# - password_env: (optional) Read the password from this environment variable
#   instead of storing it here. Takes precedence over `password`.
# - majority: (optional) Adds w=majority
# - retry_writes: (optional) Adds retryWrites=true|false
# - auth_source: (optional) Adds authSource=<value>
"#;

        fs::write(config_file, example_content).context("Failed to write example config file")?;

        Ok(())
    }

    pub fn host(&self, key: &str) -> Option<&HostConfig> {
        self.hosts.get(key)
    }

    /// Valid host keys, sorted
    pub fn host_keys(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    /// Suspicious but loadable host entries, one message per problem.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (key, host) in &self.hosts {
            if host.url.trim().is_empty() {
                warnings.push(format!("Host '{key}' has an empty url"));
            }
            if host.user.trim().is_empty() {
                warnings.push(format!("Host '{key}' has an empty user"));
            }
            if !host.mongo_base.ends_with("://") {
                warnings.push(format!(
                    "Host '{key}' has mongo_base '{}' which does not end with '://'",
                    host.mongo_base
                ));
            }
            if host.password.is_some() && host.password_env.is_some() {
                warnings.push(format!(
                    "Host '{key}' sets both password and password_env; password_env is used"
                ));
            }
        }

        warnings
    }

    pub fn validate(&self) {
        for warning in self.warnings() {
            tracing::warn!("{}", warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
hosts:
  h1:
    mongo_base: "mongodb://"
    url: cluster.example.com
    user: u
    password: p
  h2:
    mongo_base: "mongodb+srv://"
    url: cluster2.example.com
    port: 27018
    user: u
    password: p
    majority: true
    retry_writes: "TRUE"
    authSource: admin
connections:
  features:
    db: features_db
  mapping:
    db: mapping_db
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_yaml(SAMPLE).unwrap();

        assert_eq!(config.host_keys().collect::<Vec<_>>(), vec!["h1", "h2"]);
        assert_eq!(config.connections.features.db, "features_db");
        assert_eq!(config.connections.mapping.db, "mapping_db");

        let h1 = config.host("h1").unwrap();
        assert_eq!(h1.port, None);
        assert!(!h1.majority);
        assert_eq!(h1.retry_writes, None);
        assert_eq!(h1.auth_source, None);

        let h2 = config.host("h2").unwrap();
        assert_eq!(h2.port, Some(27018));
        assert!(h2.majority);
        assert_eq!(h2.retry_writes, Some(true));
        assert_eq!(h2.auth_source.as_deref(), Some("admin"));
    }

    #[test]
    fn test_retry_writes_accepts_strings_and_bools() {
        let parse = |value: &str| -> Option<bool> {
            let yaml = format!(
                "mongo_base: x\nurl: y\nuser: u\npassword: p\nretry_writes: {value}\n"
            );
            serde_yaml::from_str::<HostConfig>(&yaml).unwrap().retry_writes
        };

        assert_eq!(parse("true"), Some(true));
        assert_eq!(parse("false"), None);
        assert_eq!(parse("\"False\""), Some(false));
        assert_eq!(parse("\"tRuE\""), Some(true));
        assert_eq!(parse("\"\""), None);
    }

    #[test]
    fn test_retry_writes_rejects_garbage() {
        let yaml = "mongo_base: x\nurl: y\nuser: u\npassword: p\nretry_writes: \"maybe\"\n";
        assert!(serde_yaml::from_str::<HostConfig>(yaml).is_err());
    }

    #[test]
    fn test_missing_roles_is_an_error() {
        assert!(Config::from_yaml("hosts: {}\n").is_err());
    }

    #[test]
    fn test_resolve_password() {
        let mut host = HostConfig {
            password: Some("secret".to_string()),
            ..HostConfig::default()
        };
        assert_eq!(host.resolve_password().unwrap(), "secret");

        host.password = None;
        assert!(host.resolve_password().is_err());

        host.password_env = Some("ATLAS_MONGO_PASSWORD".to_string());
        let err = host.resolve_password_with(|_| None).unwrap_err();
        assert!(err.to_string().contains("'ATLAS_MONGO_PASSWORD' is not set"));
    }

    #[test]
    fn test_password_env_takes_precedence() {
        let host = HostConfig {
            password: Some("inline".to_string()),
            password_env: Some("ATLAS_MONGO_PASSWORD".to_string()),
            ..HostConfig::default()
        };

        let password = host
            .resolve_password_with(|var| (var == "ATLAS_MONGO_PASSWORD").then(|| "from-env".to_string()))
            .unwrap();
        assert_eq!(password, "from-env");
    }

    #[test]
    fn test_port_accepts_numbers_and_strings() {
        let parse = |value: &str| {
            let yaml = format!("mongo_base: x\nurl: y\nuser: u\npassword: p\nport: {value}\n");
            serde_yaml::from_str::<HostConfig>(&yaml).map(|h| h.port)
        };

        assert_eq!(parse("27017").unwrap(), Some(27017));
        assert_eq!(parse("\"27017\"").unwrap(), Some(27017));
        assert_eq!(parse("\"\"").unwrap(), None);
        assert_eq!(parse("null").unwrap(), None);
        assert_eq!(parse("0").unwrap(), None);
        assert!(parse("\"abc\"").is_err());
        assert!(parse("70000").is_err());
    }

    #[test]
    fn test_majority_accepts_strings_and_bools() {
        let parse = |value: &str| {
            let yaml =
                format!("mongo_base: x\nurl: y\nuser: u\npassword: p\nmajority: {value}\n");
            serde_yaml::from_str::<HostConfig>(&yaml).map(|h| h.majority)
        };

        assert!(parse("true").unwrap());
        assert!(!parse("false").unwrap());
        assert!(parse("\"true\"").unwrap());
        assert!(parse("\"TRUE\"").unwrap());
        assert!(!parse("\"\"").unwrap());
        assert!(!parse("null").unwrap());
        assert!(parse("\"often\"").is_err());
    }

    #[test]
    fn test_warnings_cover_each_problem() {
        let config = Config::from_yaml(
            r#"
hosts:
  clean:
    mongo_base: "mongodb://"
    url: cluster.example.com
    user: u
    password: p
  messy:
    mongo_base: "mongodb:"
    url: ""
    user: " "
    password: p
    password_env: MESSY_PASSWORD
connections:
  features:
    db: features_db
  mapping:
    db: mapping_db
"#,
        )
        .unwrap();

        let warnings = config.warnings();
        assert_eq!(
            warnings,
            vec![
                "Host 'messy' has an empty url".to_string(),
                "Host 'messy' has an empty user".to_string(),
                "Host 'messy' has mongo_base 'mongodb:' which does not end with '://'".to_string(),
                "Host 'messy' sets both password and password_env; password_env is used"
                    .to_string(),
            ]
        );

        config.validate();
        assert!(Config::from_yaml(SAMPLE).unwrap().warnings().is_empty());
    }

    #[test]
    fn test_load_explicit_path_missing() {
        let err = Config::load(Some("/nonexistent/mongo-registrar.yaml")).unwrap_err();
        assert!(err.to_string().contains("Configuration file not found"));
    }
}

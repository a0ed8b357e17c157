//! Configuration management for mongopilot.
//!
//! Configuration is environment-driven: the controller ships as a sidecar
//! container and every knob arrives as an environment variable. The structs
//! below give that flat namespace the same shape the rest of the codebase
//! uses, with defaults matching a stock single-app deployment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default registry base URL when no override is configured.
pub const DEFAULT_REGISTRY_URL: &str = "https://api.runonflux.io";

/// Main configuration for the controller.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Application and registry settings.
    pub app: AppConfig,
    /// Local engine settings.
    pub engine: EngineConfig,
    /// Intra-cluster keyfile material, passed through to the boot wrapper.
    pub keyfile: KeyfileConfig,
    /// Admin / peer RPC API settings.
    pub api: ApiConfig,
    /// Reconciler settings.
    pub reconcile: ReconcileConfig,
    /// Identity resolution settings.
    pub identity: IdentityConfig,
    /// Hosts-file settings.
    pub hosts: HostsConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable fails to parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary lookup function.
    ///
    /// Tests use this to stay independent of the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable fails to parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let registry_override = lookup("FLUX_API_OVERRIDE").filter(|v| !v.is_empty());

        let app = AppConfig {
            name: lookup("APP_NAME").unwrap_or_else(|| "mongo-cluster".to_string()),
            // An override points the controller at a local stand-in registry
            // and flips it into local-testing mode in one move.
            local_testing: registry_override.is_some(),
            registry_url: registry_override
                .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string()),
        };

        let engine = EngineConfig {
            replica_set: lookup("MONGO_REPLICA_SET_NAME").unwrap_or_else(|| "rs0".to_string()),
            port: parse_or_default(&lookup, "MONGO_PORT", 27017)?,
            username: lookup("MONGO_INITDB_ROOT_USERNAME").filter(|v| !v.is_empty()),
            password: lookup("MONGO_INITDB_ROOT_PASSWORD").filter(|v| !v.is_empty()),
            data_dir: lookup("MONGO_DATA_DIR")
                .map_or_else(|| PathBuf::from("/data/db"), PathBuf::from),
        };

        let keyfile = KeyfileConfig {
            passphrase: lookup("MONGO_KEYFILE_PASSPHRASE"),
            salt: lookup("MONGO_KEYFILE_SALT"),
            content: lookup("MONGO_KEYFILE_CONTENT"),
        };

        let port = parse_or_default(&lookup, "API_PORT", 3000)?;
        let api = ApiConfig {
            port,
            external_port: parse_or_default(&lookup, "EXTERNAL_API_PORT", port)?,
        };

        let reconcile = ReconcileConfig {
            interval_ms: parse_or_default(&lookup, "RECONCILE_INTERVAL", 30_000)?,
        };

        let identity = IdentityConfig {
            public_ip_override: lookup("NODE_PUBLIC_IP").filter(|v| !v.is_empty()),
        };

        let hosts = HostsConfig {
            hosts_path: lookup("HOSTS_FILE")
                .map_or_else(|| PathBuf::from("/etc/hosts"), PathBuf::from),
            nsswitch_path: lookup("NSSWITCH_FILE")
                .map_or_else(|| PathBuf::from("/etc/nsswitch.conf"), PathBuf::from),
        };

        let logging = LoggingConfig {
            level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            format: match lookup("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        Ok(Self { app, engine, keyfile, api, reconcile, identity, hosts, logging })
    }
}

fn parse_or_default<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|_| Error::Config(format!("{key} is not a valid number: {raw:?}"))),
        _ => Ok(default),
    }
}

/// Application and registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Registry query key; also names the deployment.
    pub name: String,
    /// Registry base URL.
    pub registry_url: String,
    /// Local-testing mode: identity comes from a private interface and the
    /// hosts self-entry maps to that address instead of loopback.
    pub local_testing: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "mongo-cluster".to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            local_testing: false,
        }
    }
}

/// Local engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Replica set identifier.
    pub replica_set: String,
    /// Engine listen port.
    pub port: u16,
    /// Admin username, once the root user exists.
    pub username: Option<String>,
    /// Admin password.
    pub password: Option<String>,
    /// Engine data directory; wiped during a nuclear resync.
    pub data_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            replica_set: "rs0".to_string(),
            port: 27017,
            username: None,
            password: None,
            data_dir: PathBuf::from("/data/db"),
        }
    }
}

impl EngineConfig {
    /// Returns true when admin credentials are configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// Intra-cluster auth material. The controller only carries these through
/// to the boot wrapper; it never derives keys itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyfileConfig {
    /// Passphrase the keyfile is derived from.
    pub passphrase: Option<String>,
    /// Derivation salt.
    pub salt: Option<String>,
    /// Literal keyfile content, overriding derivation.
    pub content: Option<String>,
}

/// Admin / peer RPC API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Port the axum server binds.
    pub port: u16,
    /// Port peers use to reach this node, when a fronting proxy remaps it.
    pub external_port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 3000, external_port: 3000 }
    }
}

/// Reconciler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Milliseconds between reconciliation cycles.
    pub interval_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { interval_ms: 30_000 }
    }
}

impl ReconcileConfig {
    /// Returns the cycle interval as a [`Duration`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Identity resolution settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Operator-supplied external address, used verbatim when present.
    pub public_ip_override: Option<String>,
}

/// Hosts-file settings. Paths are overridable so tests can run against a
/// temporary directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsConfig {
    /// Path of the hosts file.
    pub hosts_path: PathBuf,
    /// Path of the name-service switch file.
    pub nsswitch_path: PathBuf,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            hosts_path: PathBuf::from("/etc/hosts"),
            nsswitch_path: PathBuf::from("/etc/nsswitch.conf"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_none(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_none).unwrap();
        assert_eq!(config.app.name, "mongo-cluster");
        assert_eq!(config.app.registry_url, DEFAULT_REGISTRY_URL);
        assert!(!config.app.local_testing);
        assert_eq!(config.engine.replica_set, "rs0");
        assert_eq!(config.engine.port, 27017);
        assert_eq!(config.api.port, 3000);
        assert_eq!(config.api.external_port, 3000);
        assert_eq!(config.reconcile.interval(), Duration::from_secs(30));
        assert_eq!(config.hosts.hosts_path, PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(|key| match key {
            "APP_NAME" => Some("orders-db".to_string()),
            "MONGO_PORT" => Some("27018".to_string()),
            "RECONCILE_INTERVAL" => Some("5000".to_string()),
            "API_PORT" => Some("3100".to_string()),
            "MONGO_INITDB_ROOT_USERNAME" => Some("root".to_string()),
            "MONGO_INITDB_ROOT_PASSWORD" => Some("hunter2".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.app.name, "orders-db");
        assert_eq!(config.engine.port, 27018);
        assert_eq!(config.reconcile.interval_ms, 5000);
        assert_eq!(config.api.port, 3100);
        // External port follows the bind port unless set explicitly.
        assert_eq!(config.api.external_port, 3100);
        assert!(config.engine.has_credentials());
    }

    #[test]
    fn test_registry_override_enables_local_testing() {
        let config = Config::from_lookup(|key| match key {
            "FLUX_API_OVERRIDE" => Some("http://127.0.0.1:8123".to_string()),
            _ => None,
        })
        .unwrap();

        assert!(config.app.local_testing);
        assert_eq!(config.app.registry_url, "http://127.0.0.1:8123");
    }

    #[test]
    fn test_external_port_independent_of_bind_port() {
        let config = Config::from_lookup(|key| match key {
            "API_PORT" => Some("3000".to_string()),
            "EXTERNAL_API_PORT" => Some("33000".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.api.port, 3000);
        assert_eq!(config.api.external_port, 33000);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let result = Config::from_lookup(|key| match key {
            "MONGO_PORT" => Some("not-a-port".to_string()),
            _ => None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_credentials_are_absent() {
        let config = Config::from_lookup(|key| match key {
            "MONGO_INITDB_ROOT_USERNAME" => Some(String::new()),
            _ => None,
        })
        .unwrap();
        assert!(config.engine.username.is_none());
        assert!(!config.engine.has_credentials());
    }
}

//! Client configuration.
//!
//! Settings are layered: built-in defaults, then an optional JSON file, then
//! environment variables.
//!
//! ```json
//! { "host": "electrum.example.org", "port": 50001, "timeout_secs": 10 }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::rpc::DEFAULT_TIMEOUT;

/// Explicit config file location.
pub const CONFIG_PATH_ENV: &str = "ELECTRUMZ_CONFIG";
pub const HOST_ENV: &str = "ELECTRUMZ_HOST";
pub const PORT_ENV: &str = "ELECTRUMZ_PORT";
pub const TIMEOUT_ENV: &str = "ELECTRUMZ_TIMEOUT_SECS";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5555;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Connection settings for [`crate::rpc::RpcClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// On-disk shape. Every field is optional and overrides the default.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

/// Resolve the default config file path.
///
/// Resolution order:
/// 1. `$ELECTRUMZ_CONFIG`
/// 2. `<config dir>/electrumz/client.json` (XDG on Linux, Library on macOS)
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir().map(|dir| dir.join("electrumz").join("client.json"))
}

impl ClientConfig {
    /// Load from the default file location and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if an environment override is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_sources(default_config_path().as_deref(), |var| {
            std::env::var(var).ok()
        })
    }

    /// Layer `file` (if it exists) and `env` over the defaults.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::load`].
    pub fn from_sources(
        file: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = file {
            if path.exists() {
                config.apply_file(path)?;
            } else {
                debug!("No config file at {}, using defaults", path.display());
            }
        }

        config.apply_env(env)?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(secs) = file.timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }

        debug!("Loaded config from {}", path.display());
        Ok(())
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(host) = env(HOST_ENV) {
            self.host = host;
        }
        if let Some(port) = env(PORT_ENV) {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: PORT_ENV,
                value: port.clone(),
            })?;
        }
        if let Some(secs) = env(TIMEOUT_ENV) {
            let secs: u64 = secs.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: TIMEOUT_ENV,
                value: secs.clone(),
            })?;
            self.request_timeout = Duration::from_secs(secs);
        }
        Ok(())
    }

    /// `host:port` for [`crate::rpc::RpcClient::connect`].
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// Write `contents` to a unique file under the temp dir.
    fn temp_config(test_name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "electrumz-config-{}-{}.json",
            test_name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_sources(None, no_env).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5555);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.address(), "127.0.0.1:5555");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = PathBuf::from("/nonexistent/electrumz/client.json");
        let config = ClientConfig::from_sources(Some(&path), no_env).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = temp_config(
            "overrides",
            r#"{"host": "electrum.local", "timeout_secs": 5, "ssl_cert": "ignored"}"#,
        );
        let config = ClientConfig::from_sources(Some(&path), no_env).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(config.host, "electrum.local");
        assert_eq!(config.port, 5555);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_env_overrides_file() {
        let path = temp_config("env", r#"{"host": "from-file", "port": 1}"#);
        let env: HashMap<&str, &str> = [(HOST_ENV, "from-env"), (TIMEOUT_ENV, " 12 ")].into();

        let config =
            ClientConfig::from_sources(Some(&path), |var| env.get(var).map(|v| v.to_string()))
                .unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(config.host, "from-env");
        assert_eq!(config.port, 1);
        assert_eq!(config.request_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_invalid_env_port() {
        let result = ClientConfig::from_sources(None, |var| {
            (var == PORT_ENV).then(|| "not-a-port".to_string())
        });

        match result {
            Err(ConfigError::InvalidEnv { var, value }) => {
                assert_eq!(var, PORT_ENV);
                assert_eq!(value, "not-a-port");
            }
            other => panic!("Expected InvalidEnv, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_file() {
        let path = temp_config("invalid", "{ not json");
        let result = ClientConfig::from_sources(Some(&path), no_env);
        let _ = std::fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}

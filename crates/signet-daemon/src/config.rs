//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use signet_core::keygen::MIN_RSA_KEY_BITS;
use signet_core::RSA_KEY_BITS;

use crate::error::{DaemonError, Result};

/// Environment variable pointing at the config file
pub const CONFIG_ENV: &str = "SIGNET_CONFIG";

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Address the HTTP API listens on
    pub listen_address: String,

    /// Modulus size for newly generated RSA keys
    pub rsa_key_bits: usize,

    /// Default tracing filter, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8080".to_string(),
            rsa_key_bits: RSA_KEY_BITS,
            log_filter: "signet_daemon=info,tower_http=info".to_string(),
        }
    }
}

impl DaemonConfig {
    /// Default location of the config file
    ///
    /// `$SIGNET_CONFIG` wins; otherwise the platform config dir, falling back
    /// to the working directory when no home directory can be resolved.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::path_in(dirs::config_dir()))
    }

    fn path_in(config_dir: Option<PathBuf>) -> PathBuf {
        match config_dir {
            Some(dir) => dir.join("signet").join("daemon.json"),
            None => PathBuf::from("signet-daemon.json"),
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, writing the defaults out if the file is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        let config = Self::default();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save(path)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check values that cannot be expressed in the type
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        if self.rsa_key_bits < MIN_RSA_KEY_BITS {
            return Err(DaemonError::Config(format!(
                "rsa_key_bits must be at least {}, got {}",
                MIN_RSA_KEY_BITS, self.rsa_key_bits
            )));
        }
        Ok(())
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_address.parse().map_err(|e| {
            DaemonError::Config(format!(
                "invalid listen_address {:?}: {}",
                self.listen_address, e
            ))
        })
    }
}

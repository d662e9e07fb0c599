// ============================
// chatware-backend-lib/src/config.rs
// ============================
//! Configuration management.
use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Data directory for the flat-file audit store
    pub data_dir: PathBuf,
    /// Log level (overridden by `RUST_LOG` if set)
    pub log_level: String,
    /// Per-connection outbound queue depth; a full queue drops messages
    /// rather than blocking the relay loop
    pub outbound_queue: usize,
    /// Default page size for the call-history endpoint
    pub default_history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            outbound_queue: 32,
            default_history_limit: 10,
        }
    }
}

impl Settings {
    /// Load settings from `config.toml` merged with `CHATWARE_`-prefixed
    /// environment variables; every field falls back to its default.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load settings from an explicit config file path
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("CHATWARE_"))
            .extract()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.bind_addr.port(), 8000);
        assert_eq!(settings.data_dir, PathBuf::from("data"));
        assert_eq!(settings.outbound_queue, 32);
        assert_eq!(settings.default_history_limit, 10);
    }

    #[test]
    fn test_load_without_config_file_uses_defaults() {
        let settings = Settings::load_from("does-not-exist.toml").unwrap();
        assert_eq!(settings.log_level, "info");
    }
}

//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::service::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Base URL of the remote data service; `None` serves in-memory demo data
    pub data_service_url: Option<String>,
    /// API key sent to the data service
    pub data_service_key: Option<String>,
    /// Request timeout for the data service in seconds
    pub data_service_timeout_secs: u64,
    /// Page size when a listing does not ask for one
    pub default_page_size: u32,
    /// Largest page size a listing may ask for
    pub max_page_size: u32,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DATA_SERVICE_URL` - Data service base URL (default: unset)
    /// - `DATA_SERVICE_KEY` - Data service API key (default: unset)
    /// - `DATA_SERVICE_TIMEOUT_SECS` - Request timeout (default: 10)
    /// - `DEFAULT_PAGE_SIZE` - Default listing page size (default: 20)
    /// - `MAX_PAGE_SIZE` - Maximum listing page size (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            data_service_url: non_empty_var("DATA_SERVICE_URL"),
            data_service_key: non_empty_var("DATA_SERVICE_KEY"),
            data_service_timeout_secs: parse_var("DATA_SERVICE_TIMEOUT_SECS")
                .unwrap_or(defaults.data_service_timeout_secs),
            default_page_size: parse_var("DEFAULT_PAGE_SIZE")
                .unwrap_or(defaults.default_page_size),
            max_page_size: parse_var("MAX_PAGE_SIZE").unwrap_or(defaults.max_page_size),
        }
    }

    pub fn data_service_timeout(&self) -> Duration {
        Duration::from_secs(self.data_service_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            data_service_url: None,
            data_service_key: None,
            data_service_timeout_secs: 10,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

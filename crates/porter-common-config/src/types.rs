//! Configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PorterConfig {
    /// Transfer defaults applied to every fetch.
    pub http: HttpSettings,
    /// TLS policy for the pooled client.
    pub tls: TlsSettings,
}

/// Connector-wide transfer defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Transfer timeout covering every redirect hop, in milliseconds. `0` disables.
    pub transfer_timeout_ms: u64,
    /// Number of redirects to follow. `0` disables redirect following.
    pub max_redirects: u32,
    /// Maximum response body length in bytes. `0` disables the limit.
    pub max_body_length: u64,
    /// Surface 1xx/4xx/5xx responses normally instead of failing.
    pub return_error_responses: bool,
    /// User agent sent with every request.
    pub user_agent: String,
    /// TCP connect timeout, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Maximum idle pooled connections per host.
    pub pool_max_idle_per_host: usize,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            transfer_timeout_ms: 15_000,
            max_redirects: 5,
            max_body_length: 10 * 1024 * 1024,
            return_error_responses: false,
            user_agent: format!("porter/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_ms: 10_000,
            pool_max_idle_per_host: 10,
            gzip: true,
        }
    }
}

/// TLS settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    /// Verify the peer certificate chain and host name.
    pub verify_peer: bool,
    /// PEM bundle of additional trusted certificate authorities.
    pub ca_file: Option<PathBuf>,
    /// Directory of PEM certificate authorities.
    pub ca_directory: Option<PathBuf>,
    /// Send the server name indication extension.
    pub server_name_indication: bool,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            verify_peer: true,
            ca_file: None,
            ca_directory: None,
            server_name_indication: true,
        }
    }
}

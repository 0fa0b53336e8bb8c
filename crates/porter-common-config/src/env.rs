//! Environment variable handling.

use crate::types::PorterConfig;
use std::env;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("failed to load {path}: {source}")]
    Dotenv {
        path: String,
        #[source]
        source: dotenvy::Error,
    },
}

/// Environment variable names.
pub mod vars {
    // Configuration
    pub const PORTER_CONFIG_PATH: &str = "PORTER_CONFIG_PATH";
    pub const PORTER_ENV: &str = "PORTER_ENV";

    // Transfer overrides
    pub const PORTER_HTTP_TRANSFER_TIMEOUT_MS: &str = "PORTER_HTTP_TRANSFER_TIMEOUT_MS";
    pub const PORTER_HTTP_MAX_REDIRECTS: &str = "PORTER_HTTP_MAX_REDIRECTS";
    pub const PORTER_HTTP_MAX_BODY_LENGTH: &str = "PORTER_HTTP_MAX_BODY_LENGTH";
    pub const PORTER_HTTP_RETURN_ERRORS: &str = "PORTER_HTTP_RETURN_ERRORS";

    // TLS overrides
    pub const PORTER_TLS_VERIFY_PEER: &str = "PORTER_TLS_VERIFY_PEER";
}

/// Load `.env.<PORTER_ENV>`, `.env.local` and `.env` from `dir`.
///
/// Variables already set are never overwritten, so files are read from the
/// most specific to the least. Missing files are skipped.
pub fn load_dotenv(dir: &Path) -> Result<(), EnvError> {
    let mut files = Vec::with_capacity(3);
    if let Ok(name) = env::var(vars::PORTER_ENV) {
        files.push(format!(".env.{name}"));
    }
    files.push(".env.local".to_string());
    files.push(".env".to_string());

    for file in files {
        let path = dir.join(file);
        match dotenvy::from_path(&path) {
            Ok(()) => {}
            Err(e) if e.not_found() => {}
            Err(source) => {
                return Err(EnvError::Dotenv {
                    path: path.display().to_string(),
                    source,
                })
            }
        }
    }

    Ok(())
}

fn get_bool(var: &str) -> Option<bool> {
    env::var(var)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

fn get_int<T: FromStr>(var: &str) -> Result<Option<T>, EnvError> {
    match env::var(var) {
        Ok(v) => v.trim().parse().map(Some).map_err(|_| EnvError::InvalidValue {
            var: var.to_string(),
            message: "expected integer".to_string(),
        }),
        Err(_) => Ok(None),
    }
}

/// Apply `PORTER_*` environment overrides on top of loaded configuration.
pub fn apply_env_overrides(config: &mut PorterConfig) -> Result<(), EnvError> {
    if let Some(timeout) = get_int(vars::PORTER_HTTP_TRANSFER_TIMEOUT_MS)? {
        config.http.transfer_timeout_ms = timeout;
    }
    if let Some(redirects) = get_int(vars::PORTER_HTTP_MAX_REDIRECTS)? {
        config.http.max_redirects = redirects;
    }
    if let Some(length) = get_int(vars::PORTER_HTTP_MAX_BODY_LENGTH)? {
        config.http.max_body_length = length;
    }
    if let Some(return_errors) = get_bool(vars::PORTER_HTTP_RETURN_ERRORS) {
        config.http.return_error_responses = return_errors;
    }
    if let Some(verify) = get_bool(vars::PORTER_TLS_VERIFY_PEER) {
        config.tls.verify_peer = verify;
    }

    Ok(())
}

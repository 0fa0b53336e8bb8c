//! Configuration file loading and parsing.

use crate::env::{apply_env_overrides, load_dotenv, vars, EnvError};
use crate::types::PorterConfig;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },

    #[error(transparent)]
    Env(#[from] EnvError),
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env var pattern is a valid regex")
    })
}

/// Configuration loader.
pub struct ConfigLoader {
    config_path: PathBuf,
    env_dir: PathBuf,
    required: bool,
}

impl ConfigLoader {
    /// Create a loader for `<project_dir>/.porter/config.yaml`.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            config_path: project_dir.as_ref().join(".porter/config.yaml"),
            env_dir: project_dir.as_ref().to_path_buf(),
            required: false,
        }
    }

    /// Create a loader for an explicit file, which must exist.
    ///
    /// `.env` files are read from the file's directory.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let config_path = path.into();
        let env_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Self {
            config_path,
            env_dir,
            required: true,
        }
    }

    /// Path the loader reads from and saves to.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load `.env` files and the configuration file, then apply `PORTER_*`
    /// environment overrides.
    pub fn load(&self) -> Result<PorterConfig, ConfigError> {
        load_dotenv(&self.env_dir)?;
        let mut config = self.load_file()?;
        apply_env_overrides(&mut config)?;
        self.validate(&config)?;
        Ok(config)
    }

    fn load_file(&self) -> Result<PorterConfig, ConfigError> {
        if !self.config_path.exists() {
            if self.required {
                return Err(ConfigError::NotFound {
                    path: self.config_path.clone(),
                });
            }
            return Ok(PorterConfig::default());
        }

        let contents = std::fs::read_to_string(&self.config_path)?;
        let expanded = self.expand_env_vars(&contents)?;

        serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })
    }

    /// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
    fn expand_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();

        for cap in env_var_pattern().captures_iter(content) {
            let full_match = &cap[0];
            let var_name = &cap[1];
            let default = cap.get(2).map(|m| m.as_str());

            let value = match std::env::var(var_name) {
                Ok(v) => v,
                Err(_) => match default {
                    Some(d) => d.to_string(),
                    None => {
                        return Err(ConfigError::EnvVarNotFound {
                            var: var_name.to_string(),
                        })
                    }
                },
            };

            result = result.replace(full_match, &value);
        }

        Ok(result)
    }

    /// Validate configuration values.
    fn validate(&self, config: &PorterConfig) -> Result<(), ConfigError> {
        if config.http.user_agent.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "http.user_agent must not be empty".to_string(),
            });
        }

        if config.http.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError {
                message: "http.connect_timeout_ms must be greater than 0".to_string(),
            });
        }

        // A connect timeout longer than the whole transfer can never fire.
        if config.http.transfer_timeout_ms != 0
            && config.http.connect_timeout_ms > config.http.transfer_timeout_ms
        {
            return Err(ConfigError::ValidationError {
                message: "http.connect_timeout_ms must not exceed http.transfer_timeout_ms"
                    .to_string(),
            });
        }

        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, config: &PorterConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        std::fs::write(&self.config_path, yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        match std::env::var(vars::PORTER_CONFIG_PATH) {
            Ok(path) => Self::from_file(path),
            Err(_) => Self::new(std::env::current_dir().unwrap_or_default()),
        }
    }
}

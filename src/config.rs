//! Configuration module for Archivist.

use serde::Deserialize;
use std::path::Path;

use crate::{ArchivistError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite file holding the key-value store.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/archivist.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Archive storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory under which every account keeps its collections.
    #[serde(default = "default_root_dir")]
    pub root_dir: String,
}

fn default_root_dir() -> String {
    "data/accounts".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
        }
    }
}

/// System-wide quota defaults, copied into each new account.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    /// Maximum stored bytes per account.
    #[serde(default = "default_max_len")]
    pub max_len: u64,
    /// Maximum number of collections per account.
    #[serde(default = "default_max_coll")]
    pub max_coll: u64,
}

fn default_max_len() -> u64 {
    1_000_000_000
}

fn default_max_coll() -> u64 {
    10
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_len: default_max_len(),
            max_coll: default_max_coll(),
        }
    }
}

/// Registration and password reset configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// Role assigned to newly registered accounts.
    #[serde(default = "default_role")]
    pub default_role: String,
    /// Level of the default role.
    #[serde(default = "default_role_level")]
    pub default_role_level: i64,
    /// Lifetime of a password reset code in seconds.
    #[serde(default = "default_reset_code_expiry")]
    pub reset_code_expiry_secs: u64,
}

fn default_role() -> String {
    "archivist".to_string()
}

fn default_role_level() -> i64 {
    50
}

fn default_reset_code_expiry() -> u64 {
    24 * 60 * 60
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            default_role: default_role(),
            default_role_level: default_role_level(),
            reset_code_expiry_secs: default_reset_code_expiry(),
        }
    }
}

/// Outgoing mail configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Sender address.
    #[serde(default = "default_sender")]
    pub sender: String,
    /// Subject line of invitation mails.
    #[serde(default = "default_invite_subject")]
    pub invite_subject: String,
    /// Subject line of registration confirmation mails.
    #[serde(default = "default_register_subject")]
    pub register_subject: String,
    /// Subject line of password reset mails.
    #[serde(default = "default_reset_subject")]
    pub reset_subject: String,
}

fn default_sender() -> String {
    "noreply@localhost".to_string()
}

fn default_invite_subject() -> String {
    "You are invited to join the archive!".to_string()
}

fn default_register_subject() -> String {
    "Please confirm your registration".to_string()
}

fn default_reset_subject() -> String {
    "Password reset request".to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
            invite_subject: default_invite_subject(),
            register_subject: default_register_subject(),
            reset_subject: default_reset_subject(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/archivist.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Archive storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Quota defaults.
    #[serde(default)]
    pub quota: QuotaConfig,
    /// Registration configuration.
    #[serde(default)]
    pub registration: RegistrationConfig,
    /// Mail configuration.
    #[serde(default)]
    pub mail: MailConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ArchivistError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ArchivistError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `ARCHIVIST_DATABASE_PATH`: Override the database file path
    /// - `ARCHIVIST_STORAGE_ROOT`: Override the archive root directory
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("ARCHIVIST_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(root) = std::env::var("ARCHIVIST_STORAGE_ROOT") {
            if !root.is_empty() {
                self.storage.root_dir = root;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.storage.root_dir.is_empty() {
            return Err(ArchivistError::Config(
                "storage.root_dir must not be empty".to_string(),
            ));
        }
        if self.quota.max_coll == 0 {
            return Err(ArchivistError::Config(
                "quota.max_coll must be at least 1".to_string(),
            ));
        }
        if self.registration.default_role.is_empty() {
            return Err(ArchivistError::Config(
                "registration.default_role must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

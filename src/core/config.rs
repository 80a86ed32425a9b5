//! Configuration module for the photo store
//!
//! Supports loading configuration from a TOML file.
//! Configuration is stored in a standard location:
//! - Windows: %APPDATA%\photo_store\config.toml
//! - Linux: ~/.config/photo_store/config.toml
//! - macOS: ~/Library/Application Support/photo_store/config.toml

use crate::core::error::StoreError;
use crate::core::tree::{CollisionPolicy, TreeBuilder};
use crate::duplicate::fingerprint::{Fingerprinter, DEFAULT_PREFIX_LEN};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application name used for config directory
const APP_NAME: &str = "photo_store";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config file name looked up in the current directory
const LOCAL_CONFIG_FILE_NAME: &str = "photo_store.toml";

/// Get the standard configuration directory for the application.
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// Get the standard configuration file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Ensure the configuration directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let config_dir = get_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .map_err(|e| ConfigError::WriteError(config_dir.clone(), e.to_string()))?;
    }

    Ok(config_dir)
}

/// Initialize the configuration file if it doesn't exist.
///
/// Returns the path to the config file.
pub fn init_config() -> Result<PathBuf, ConfigError> {
    let config_dir = ensure_config_dir()?;
    let config_path = config_dir.join(CONFIG_FILE_NAME);

    if !config_path.exists() {
        fs::write(&config_path, Config::generate_default_config())
            .map_err(|e| ConfigError::WriteError(config_path.clone(), e.to_string()))?;
    }

    Ok(config_path)
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output tree settings
    pub output: OutputConfig,

    /// Input directory settings
    pub scan: ScanConfig,

    /// Fingerprint settings
    pub fingerprint: FingerprintConfig,

    /// Metadata cache settings
    pub cache: CacheConfig,

    /// Duplicate report settings
    pub duplicates: DuplicatesConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Output tree configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of the date tree; also holds the metadata cache
    pub directory: PathBuf,

    /// How to name links whose file names collide
    pub collision_policy: CollisionPolicy,
}

/// Input directory configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directories to ingest, in order
    pub directories: Vec<PathBuf>,

    /// Follow symbolic links while walking
    pub follow_symlinks: bool,
}

/// Fingerprint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Number of leading bytes hashed per file
    ///
    /// Caches are only meaningful for the prefix length that built them.
    pub prefix_len: usize,
}

/// Metadata cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Load the cache at startup and save it after each directory
    pub enabled: bool,
}

/// Duplicate report configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicatesConfig {
    /// Report likely duplicates after ingestion
    pub report: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log to file
    pub log_to_file: bool,

    /// Log file path
    pub log_file: PathBuf,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            prefix_len: DEFAULT_PREFIX_LEN,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("./photo_store.log"),
        }
    }
}

impl Config {
    /// The configured output directory
    ///
    /// A run cannot start without one.
    pub fn output_dir(&self) -> Result<&Path, StoreError> {
        if self.output.directory.as_os_str().is_empty() {
            Err(StoreError::MissingOutputDirectory)
        } else {
            Ok(&self.output.directory)
        }
    }

    /// Fingerprinter for the configured prefix length
    pub fn fingerprinter(&self) -> Fingerprinter {
        Fingerprinter::new(self.fingerprint.prefix_len)
    }

    /// Tree builder for the configured output directory and policy
    pub fn tree_builder(&self) -> Result<TreeBuilder, StoreError> {
        Ok(TreeBuilder::new(self.output_dir()?.to_path_buf())
            .with_collision_policy(self.output.collision_policy))
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        config.validate(path)?;

        Ok(config)
    }

    /// Reject values that parse but cannot drive a run
    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        // An empty prefix hashes every file to the same fingerprint
        if self.fingerprint.prefix_len == 0 {
            return Err(ConfigError::InvalidValue(
                path.to_path_buf(),
                "fingerprint.prefix_len must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./photo_store.toml (current directory)
    /// 2. Standard config location
    ///
    /// If no config file is found, returns default configuration.
    pub fn load_default() -> Result<Self, ConfigError> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
        if local.exists() {
            return Self::load(&local);
        }

        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        Ok(Self::default())
    }

    /// Get the path where the config file is (or would be) located.
    pub fn get_active_config_path() -> PathBuf {
        let local = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
        if local.exists() {
            return local;
        }

        get_config_path().unwrap_or(local)
    }

    /// Generate a default config file with comments
    pub fn generate_default_config() -> String {
        include_str!("../../config.example.toml").to_string()
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file was not found at the specified path
    FileNotFound(PathBuf),
    /// Failed to read the configuration file
    ReadError(PathBuf, String),
    /// Failed to parse the configuration file (invalid TOML)
    ParseError(PathBuf, String),
    /// A value parsed but is out of range
    InvalidValue(PathBuf, String),
    /// Failed to write configuration file
    WriteError(PathBuf, String),
    /// Could not determine config directory
    ConfigDirNotFound,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ReadError(path, err) => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ParseError(path, err) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::InvalidValue(path, err) => {
                write!(f, "Invalid value in config file '{}': {}", path.display(), err)
            }
            ConfigError::WriteError(path, err) => {
                write!(
                    f,
                    "Failed to write config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ConfigDirNotFound => {
                write!(f, "Could not determine configuration directory")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

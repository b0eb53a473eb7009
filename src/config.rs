use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// What to do when an after-write hook fails.
///
/// Before-write hooks always abort the write; this only covers failures that
/// happen once the user record is already committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookFailurePolicy {
    /// Report the failure to the caller.
    #[default]
    Propagate,
    /// Log the failure and report success.
    Log,
}

impl std::fmt::Display for HookFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookFailurePolicy::Propagate => write!(f, "propagate"),
            HookFailurePolicy::Log => write!(f, "log"),
        }
    }
}

impl FromStr for HookFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "propagate" => Ok(HookFailurePolicy::Propagate),
            "log" => Ok(HookFailurePolicy::Log),
            other => Err(format!("unknown hook failure policy '{}'", other)),
        }
    }
}

/// Extra registration fields accepted by default.
pub const DEFAULT_ALLOWED_FIELDS: &[&str] = &["fullName", "bio"];

/// Registration section of the config file
#[derive(Debug, Clone, Deserialize, Default)]
struct RegistrationFile {
    allowed_fields: Option<Vec<String>>,
}

/// Hooks section of the config file
#[derive(Debug, Clone, Deserialize, Default)]
struct HooksFile {
    on_failure: Option<HookFailurePolicy>,
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    /// Extra fields user registration accepts and forwards to lifecycle hooks
    pub allowed_fields: ConfigValue<Vec<String>>,
    /// Handling of after-write hook failures
    pub hook_failure: ConfigValue<HookFailurePolicy>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    registration: Option<RegistrationFile>,
    hooks: Option<HooksFile>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let default_db_path = Self::default_data_dir().join("profilesync.db");
        let default_fields: Vec<String> = DEFAULT_ALLOWED_FIELDS
            .iter()
            .map(|f| f.to_string())
            .collect();

        // Start with defaults
        let mut database_path = ConfigValue::new(default_db_path, ConfigSource::Default);
        let mut allowed_fields = ConfigValue::new(default_fields, ConfigSource::Default);
        let mut hook_failure =
            ConfigValue::new(HookFailurePolicy::default(), ConfigSource::Default);
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(fields) = file_config.registration.and_then(|r| r.allowed_fields) {
                allowed_fields = ConfigValue::new(fields, ConfigSource::File);
            }
            if let Some(policy) = file_config.hooks.and_then(|h| h.on_failure) {
                hook_failure = ConfigValue::new(policy, ConfigSource::File);
            }
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("PROFILESYNC_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(fields) = std::env::var("PROFILESYNC_ALLOWED_FIELDS") {
            let fields: Vec<String> = fields
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from)
                .collect();
            allowed_fields = ConfigValue::new(fields, ConfigSource::Environment);
        }
        if let Ok(policy) = std::env::var("PROFILESYNC_HOOK_FAILURE") {
            let parsed = policy.parse::<HookFailurePolicy>().map_err(|_| {
                ConfigError::InvalidValue("PROFILESYNC_HOOK_FAILURE".to_string(), policy.clone())
            })?;
            hook_failure = ConfigValue::new(parsed, ConfigSource::Environment);
        }

        Ok(Self {
            database_path,
            allowed_fields,
            hook_failure,
            config_file,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/profilesync/
    /// - macOS: ~/Library/Application Support/profilesync/
    /// - Windows: %APPDATA%/profilesync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("profilesync")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/profilesync/
    /// - macOS: ~/Library/Application Support/profilesync/
    /// - Windows: %APPDATA%/profilesync/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("profilesync")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(var, value) => {
                write!(f, "Invalid value for {}: '{}'", var, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

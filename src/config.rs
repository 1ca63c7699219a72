use crate::cli::Cli;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

const CONFIG_FILE_NAMES: [&str; 4] = [
    "catalog-import.toml",
    "catalog-import.json",
    ".catalog-import.toml",
    ".catalog-import.json",
];

/// Main import configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ImportConfig {
    pub bmecat: BmecatConfig,
    pub datanorm: DatanormConfig,
    pub detection: DetectionConfig,
}

/// BMEcat adapter settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BmecatConfig {
    /// Directory searched for XSDs that are not compiled in
    pub schema_dir: Option<PathBuf>,
    /// Maximum number of parsed schemas kept in memory
    pub schema_cache_capacity: u64,
}

/// Datanorm adapter settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatanormConfig {
    /// Lines inspected by content-based detection
    pub detection_sample_lines: usize,
    /// A sampled line must be longer than this to count as a record
    pub detection_min_line_length: usize,
    /// Lines shorter than this are reported as truncated
    pub min_record_length: usize,
    /// Characters of an offending line included in log output
    pub snippet_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DetectionConfig {
    /// A detection must score strictly above this
    pub min_confidence: f64,
}

impl Default for BmecatConfig {
    fn default() -> Self {
        Self {
            schema_dir: None,
            schema_cache_capacity: 16,
        }
    }
}

impl Default for DatanormConfig {
    fn default() -> Self {
        Self {
            detection_sample_lines: 100,
            detection_min_line_length: 10,
            min_record_length: 5,
            snippet_length: 50,
        }
    }
}

impl BmecatConfig {
    /// Configured schema directory, else `schemas/` next to the executable.
    pub fn effective_schema_dir(&self) -> Option<PathBuf> {
        self.schema_dir.clone().or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|dir| dir.join("schemas")))
        })
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<ImportConfig> {
        let mut config = match &cli.config {
            Some(config_path) => Self::load_from_file(config_path).await?,
            None => Self::find_config_file().await?.unwrap_or_default(),
        };

        config = Self::apply_environment_overrides(config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<ImportConfig> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                if let Ok(config) = toml::from_str::<ImportConfig>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<ImportConfig>> {
        let mut search_dirs = vec![PathBuf::from(".")];
        if let Some(config_dir) = dirs::config_dir() {
            search_dirs.push(config_dir.join("catalog-import"));
        }

        for dir in &search_dirs {
            if let Some(config) = Self::find_config_in(dir).await? {
                return Ok(Some(config));
            }
        }

        Ok(None)
    }

    /// Load the first known configuration file found in `dir`
    pub async fn find_config_in(dir: &Path) -> Result<Option<ImportConfig>> {
        for name in &CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration file");
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }
        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: ImportConfig) -> Result<ImportConfig> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: ImportConfig,
    ) -> Result<ImportConfig> {
        if let Some(schema_dir) = env.get("CATALOG_IMPORT_SCHEMA_DIR") {
            config.bmecat.schema_dir = Some(PathBuf::from(schema_dir));
        }

        if let Some(capacity) = env.get("CATALOG_IMPORT_SCHEMA_CACHE_CAPACITY") {
            config.bmecat.schema_cache_capacity =
                parse_env("CATALOG_IMPORT_SCHEMA_CACHE_CAPACITY", &capacity)?;
        }

        if let Some(lines) = env.get("CATALOG_IMPORT_DATANORM_SAMPLE_LINES") {
            config.datanorm.detection_sample_lines =
                parse_env("CATALOG_IMPORT_DATANORM_SAMPLE_LINES", &lines)?;
        }

        if let Some(length) = env.get("CATALOG_IMPORT_DATANORM_MIN_LINE_LENGTH") {
            config.datanorm.detection_min_line_length =
                parse_env("CATALOG_IMPORT_DATANORM_MIN_LINE_LENGTH", &length)?;
        }

        if let Some(length) = env.get("CATALOG_IMPORT_DATANORM_MIN_RECORD_LENGTH") {
            config.datanorm.min_record_length =
                parse_env("CATALOG_IMPORT_DATANORM_MIN_RECORD_LENGTH", &length)?;
        }

        if let Some(length) = env.get("CATALOG_IMPORT_SNIPPET_LENGTH") {
            config.datanorm.snippet_length = parse_env("CATALOG_IMPORT_SNIPPET_LENGTH", &length)?;
        }

        if let Some(confidence) = env.get("CATALOG_IMPORT_MIN_CONFIDENCE") {
            config.detection.min_confidence =
                parse_env("CATALOG_IMPORT_MIN_CONFIDENCE", &confidence)?;
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: ImportConfig, cli: &Cli) -> ImportConfig {
        if let Some(schema_dir) = &cli.schema_dir {
            config.bmecat.schema_dir = Some(schema_dir.clone());
        }
        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &ImportConfig) -> Result<()> {
        if config.bmecat.schema_cache_capacity == 0 {
            return Err(ConfigError::Validation(
                "Schema cache capacity must be greater than 0".to_string(),
            ));
        }

        if config.datanorm.detection_sample_lines == 0 {
            return Err(ConfigError::Validation(
                "Datanorm detection sample must include at least one line".to_string(),
            ));
        }

        if config.datanorm.snippet_length == 0 {
            return Err(ConfigError::Validation(
                "Snippet length must be greater than 0".to_string(),
            ));
        }

        let confidence = config.detection.min_confidence;
        if !(0.0..1.0).contains(&confidence) {
            return Err(ConfigError::Validation(format!(
                "min_confidence must be in [0.0, 1.0), got {}",
                confidence
            )));
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
}

//! Configuration loading, validation, and management for treeprice.
//!
//! Loads configuration from `~/.treeprice/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use treeprice_aggregator::{AggregatorConfig, PipelineConfig};
use treeprice_core::numeric::{DEFAULT_DECIMAL_PRECISION, MAX_DECIMAL_PRECISION};
use treeprice_core::{DecimalContext, NumericMode, Rounding};
use treeprice_parsers::{ColumnRef, ParserOptions};

/// Log levels accepted by `[logging] level`.
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// The root configuration structure.
///
/// Maps directly to `~/.treeprice/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub columns: ColumnsConfig,

    #[serde(default)]
    pub numeric: NumericConfig,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Input file locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Grouping document (JSON).
    #[serde(default = "default_trees")]
    pub trees: PathBuf,

    /// Attribute records (CSV with a header row).
    #[serde(default = "default_properties")]
    pub properties: PathBuf,
}

fn default_trees() -> PathBuf {
    PathBuf::from("dublin-trees.json")
}
fn default_properties() -> PathBuf {
    PathBuf::from("dublin-property.csv")
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            trees: default_trees(),
            properties: default_properties(),
        }
    }
}

/// Which CSV columns hold the join key and the value.
///
/// Each column is given either by header name or by zero-based index,
/// never both. Fields left out of an explicit `[columns]` table are unset;
/// an absent table selects `Street Name` and `Price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_index: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_index: Option<usize>,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            entity: Some("Street Name".into()),
            entity_index: None,
            value: Some("Price".into()),
            value_index: None,
        }
    }
}

impl ColumnsConfig {
    fn entity_column(&self) -> Result<ColumnRef, ConfigError> {
        pick("entity", self.entity.as_deref(), self.entity_index)
    }

    fn value_column(&self) -> Result<ColumnRef, ConfigError> {
        pick("value", self.value.as_deref(), self.value_index)
    }
}

fn pick(what: &str, name: Option<&str>, index: Option<usize>) -> Result<ColumnRef, ConfigError> {
    match (name, index) {
        (Some(_), Some(_)) => Err(ConfigError::ValidationError(format!(
            "columns.{what} and columns.{what}_index are mutually exclusive"
        ))),
        (Some(name), None) => Ok(ColumnRef::Name(name.to_string())),
        (None, Some(index)) => Ok(ColumnRef::Index(index)),
        (None, None) => Err(ConfigError::ValidationError(format!(
            "one of columns.{what} or columns.{what}_index must be set"
        ))),
    }
}

/// Numeric mode and the decimal averaging context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericConfig {
    #[serde(default)]
    pub mode: NumericMode,

    /// Significant digits kept when dividing (1..=100).
    #[serde(default = "default_precision")]
    pub precision: u32,

    /// Fractional digits of every average.
    #[serde(default = "default_scale")]
    pub scale: u32,

    #[serde(default)]
    pub rounding: Rounding,
}

fn default_precision() -> u32 {
    DEFAULT_DECIMAL_PRECISION
}
fn default_scale() -> u32 {
    2
}

impl Default for NumericConfig {
    fn default() -> Self {
        Self {
            mode: NumericMode::default(),
            precision: default_precision(),
            scale: default_scale(),
            rounding: Rounding::default(),
        }
    }
}

/// Queue capacities between pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Classifier → engine.
    #[serde(default = "default_group_queue")]
    pub group_queue: usize,

    /// Parser → engine.
    #[serde(default = "default_value_queue")]
    pub value_queue: usize,

    /// Router → each averaging worker.
    #[serde(default = "default_group_worker_queue")]
    pub group_worker_queue: usize,
}

fn default_group_queue() -> usize {
    treeprice_aggregator::pipeline::DEFAULT_GROUP_ITEM_QUEUE
}
fn default_value_queue() -> usize {
    treeprice_aggregator::pipeline::DEFAULT_VALUE_QUEUE
}
fn default_group_worker_queue() -> usize {
    treeprice_aggregator::engine::DEFAULT_GROUP_QUEUE
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            group_queue: default_group_queue(),
            value_queue: default_value_queue(),
            group_worker_queue: default_group_worker_queue(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append logs here instead of stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.treeprice/config.toml).
    ///
    /// Environment variables override file values:
    /// - `TREEPRICE_TREES`
    /// - `TREEPRICE_PROPERTIES`
    /// - `TREEPRICE_NUMERIC_MODE` (`decimal` or `float`)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_path())
    }

    /// Load `path`, apply environment overrides and validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`load`](Self::load)).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(trees) = lookup("TREEPRICE_TREES") {
            self.input.trees = PathBuf::from(trees);
        }
        if let Some(properties) = lookup("TREEPRICE_PROPERTIES") {
            self.input.properties = PathBuf::from(properties);
        }
        if let Some(mode) = lookup("TREEPRICE_NUMERIC_MODE") {
            self.numeric.mode = mode.parse().map_err(|e: String| {
                ConfigError::ValidationError(format!("TREEPRICE_NUMERIC_MODE: {e}"))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".treeprice")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.columns.entity_column()?;
        self.columns.value_column()?;

        if !(1..=MAX_DECIMAL_PRECISION).contains(&self.numeric.precision) {
            return Err(ConfigError::ValidationError(format!(
                "numeric.precision must be between 1 and {MAX_DECIMAL_PRECISION}"
            )));
        }
        if self.numeric.scale > MAX_DECIMAL_PRECISION {
            return Err(ConfigError::ValidationError(format!(
                "numeric.scale must be at most {MAX_DECIMAL_PRECISION}"
            )));
        }

        let queues = [
            ("group_queue", self.pipeline.group_queue),
            ("value_queue", self.pipeline.value_queue),
            ("group_worker_queue", self.pipeline.group_worker_queue),
        ];
        for (name, capacity) in queues {
            if capacity == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "pipeline.{name} must be > 0"
                )));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level '{}' is not one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Column selection and numeric mode for the attribute parser.
    pub fn parser_options(&self) -> Result<ParserOptions, ConfigError> {
        Ok(ParserOptions::new(
            self.columns.entity_column()?,
            self.columns.value_column()?,
        )
        .with_mode(self.numeric.mode))
    }

    pub fn decimal_context(&self) -> DecimalContext {
        DecimalContext {
            precision: self.numeric.precision,
            scale: self.numeric.scale,
            rounding: self.numeric.rounding,
        }
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            context: self.decimal_context(),
            group_queue: self.pipeline.group_worker_queue,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            group_queue: self.pipeline.group_queue,
            value_queue: self.pipeline.value_queue,
        }
    }

    /// Serialize to TOML (for the `config` command).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        Self::default().to_toml()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

//! Configuration module for bucketsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with discovery, loading, credential merging, validation, defaults, and a
//! builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::filter::GlobFilter;
use crate::domain::retention::RetentionPolicy;

/// File name looked up during discovery.
pub const CONFIG_FILE_NAME: &str = "bucketsync.yml";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for bucketsync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub upsync: UpsyncConfig,
    pub logging: LoggingConfig,
}

/// Object store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Access key id. `None` defers to the AWS default credential chain.
    pub access_key: Option<String>,
    /// Secret access key.
    pub secret_key: Option<String>,
    /// Region used for signing requests.
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
    pub endpoint_url: Option<String>,
}

/// Defaults for the `upsync` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpsyncConfig {
    /// Glob matched against paths relative to the sync root.
    pub glob: String,
    /// Upload with the `public-read` ACL.
    pub public: bool,
    /// Skip the confirmation prompt.
    pub no_prompt: bool,
    /// Apply day/week/month retention and delete unkept remote objects.
    pub backups_retain: bool,
    pub days_retain: u32,
    pub weeks_retain: u32,
    pub months_retain: u32,
    /// Report what would happen without touching the store.
    pub dry_run: bool,
    /// Maximum in-flight store operations.
    pub concurrency: usize,
}

impl UpsyncConfig {
    /// The retention policy described by the `*_retain` fields.
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.days_retain, self.weeks_retain, self.months_retain)
    }
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            secret_key: None,
            region: "us-east-1".to_string(),
            endpoint_url: None,
        }
    }
}

impl Default for UpsyncConfig {
    fn default() -> Self {
        let retention = RetentionPolicy::default();
        Self {
            glob: "**/*".to_string(),
            public: false,
            no_prompt: false,
            backups_retain: false,
            days_retain: retention.days,
            weeks_retain: retention.weeks,
            months_retain: retention.months,
            dry_run: false,
            concurrency: 4,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading and discovery
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                Self::default()
            }
        }
    }

    /// Candidate config locations, in lookup order.
    ///
    /// `<dir>/bucketsync.yml`, `<dir>/tmp/bucketsync.yml`, then the
    /// per-user `$XDG_CONFIG_HOME/bucketsync/bucketsync.yml`.
    pub fn search_paths(dir: &Path) -> Vec<PathBuf> {
        let mut paths = vec![
            dir.join(CONFIG_FILE_NAME),
            dir.join("tmp").join(CONFIG_FILE_NAME),
        ];
        if let Some(user) = Self::user_path() {
            paths.push(user);
        }
        paths
    }

    /// First existing config file found from `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        Self::search_paths(dir).into_iter().find(|p| p.is_file())
    }

    /// Per-user configuration path.
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("bucketsync").join(CONFIG_FILE_NAME))
    }

    /// Resolve the effective configuration.
    ///
    /// An explicit path must load. Otherwise the discovered file is used if
    /// it parses, and defaults if nothing is found.
    pub fn resolve(explicit: Option<&Path>, dir: &Path) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => Ok(Self::discover(dir)
                .map(|path| {
                    tracing::debug!(path = %path.display(), "Using discovered config file");
                    Self::load_or_default(&path)
                })
                .unwrap_or_default()),
        }
    }

    /// Fill credentials missing from the file using environment variables.
    ///
    /// `KEY`/`SECRET` are consulted first, then `AWS_ACCESS_KEY_ID`/
    /// `AWS_SECRET_ACCESS_KEY`, then the older `AMAZON_ACCESS_KEY_ID`/
    /// `AMAZON_SECRET_ACCESS_KEY`. Values from the file always win.
    pub fn merge_env_credentials<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.is_empty()))
        };

        if self.store.access_key.is_none() {
            self.store.access_key =
                first(&["KEY", "AWS_ACCESS_KEY_ID", "AMAZON_ACCESS_KEY_ID"]);
        }
        if self.store.secret_key.is_none() {
            self.store.secret_key = first(&[
                "SECRET",
                "AWS_SECRET_ACCESS_KEY",
                "AMAZON_SECRET_ACCESS_KEY",
            ]);
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"upsync.concurrency"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for `upsync.concurrency`.
pub const MAX_CONCURRENCY: usize = 32;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- store ---
        if self.store.region.trim().is_empty() {
            errors.push(ValidationError {
                field: "store.region".into(),
                message: "must not be empty".into(),
            });
        }
        if self.store.access_key.is_some() != self.store.secret_key.is_some() {
            errors.push(ValidationError {
                field: "store.access_key".into(),
                message: "access_key and secret_key must be set together".into(),
            });
        }
        if let Some(endpoint) = &self.store.endpoint_url {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                errors.push(ValidationError {
                    field: "store.endpoint_url".into(),
                    message: format!("must be an http(s) URL, got '{endpoint}'"),
                });
            }
        }

        // --- upsync ---
        if let Err(e) = GlobFilter::new(&self.upsync.glob) {
            errors.push(ValidationError {
                field: "upsync.glob".into(),
                message: e.to_string(),
            });
        }
        if !(1..=MAX_CONCURRENCY).contains(&self.upsync.concurrency) {
            errors.push(ValidationError {
                field: "upsync.concurrency".into(),
                message: format!("must be between 1 and {MAX_CONCURRENCY}"),
            });
        }
        if self.upsync.backups_retain && self.upsync.retention_policy().is_empty() {
            errors.push(ValidationError {
                field: "upsync.days_retain".into(),
                message: "retention needs at least one day, week or month to keep".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and lets callers override individual fields.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder pre-filled with default values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- store ---

    pub fn store_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.config.store.access_key = Some(access_key.into());
        self.config.store.secret_key = Some(secret_key.into());
        self
    }

    pub fn store_region(mut self, region: impl Into<String>) -> Self {
        self.config.store.region = region.into();
        self
    }

    pub fn store_endpoint_url(mut self, endpoint: impl Into<String>) -> Self {
        self.config.store.endpoint_url = Some(endpoint.into());
        self
    }

    // --- upsync ---

    pub fn upsync_glob(mut self, glob: impl Into<String>) -> Self {
        self.config.upsync.glob = glob.into();
        self
    }

    pub fn upsync_public(mut self, public: bool) -> Self {
        self.config.upsync.public = public;
        self
    }

    pub fn upsync_no_prompt(mut self, no_prompt: bool) -> Self {
        self.config.upsync.no_prompt = no_prompt;
        self
    }

    pub fn upsync_backups_retain(mut self, retain: bool) -> Self {
        self.config.upsync.backups_retain = retain;
        self
    }

    pub fn upsync_retention(mut self, days: u32, weeks: u32, months: u32) -> Self {
        self.config.upsync.days_retain = days;
        self.config.upsync.weeks_retain = weeks;
        self.config.upsync.months_retain = months;
        self
    }

    pub fn upsync_dry_run(mut self, dry_run: bool) -> Self {
        self.config.upsync.dry_run = dry_run;
        self
    }

    pub fn upsync_concurrency(mut self, concurrency: usize) -> Self {
        self.config.upsync.concurrency = concurrency;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

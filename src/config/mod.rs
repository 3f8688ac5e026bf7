//! Configuration management for radshift
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::coverage::{ReassignmentGroup, ReassignmentRules};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Import configuration
    pub ingest: IngestConfig,

    /// Coverage calculation configuration
    pub coverage: CoverageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Import configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Warn when a weekday in the window has no MidC assignment
    pub require_weekday_midc: bool,

    /// Largest accepted number of candidate rows per import
    pub max_rows: usize,

    /// Largest accepted desired coverage of a single shift
    pub max_desired_coverage: u32,
}

/// Coverage calculation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Shift-type groups split by a body-only radiologist
    pub reassignment_groups: Vec<ReassignmentGroup>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/radshift.db"),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            require_weekday_midc: true,
            max_rows: 50_000,
            max_desired_coverage: 100,
        }
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            reassignment_groups: vec![ReassignmentGroup::overnight()],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let sqlite_path = std::env::var("RADSHIFT_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database.sqlite_path);

        let require_weekday_midc = env_bool("RADSHIFT_REQUIRE_WEEKDAY_MIDC")
            .unwrap_or(defaults.ingest.require_weekday_midc);

        let max_rows = match std::env::var("RADSHIFT_MAX_ROWS") {
            Ok(v) => v
                .parse::<usize>()
                .with_context(|| format!("RADSHIFT_MAX_ROWS is not a number: {v}"))?,
            Err(_) => defaults.ingest.max_rows,
        };

        let max_desired_coverage = match std::env::var("RADSHIFT_MAX_DESIRED_COVERAGE") {
            Ok(v) => v.parse::<u32>().with_context(|| {
                format!("RADSHIFT_MAX_DESIRED_COVERAGE is not a number: {v}")
            })?,
            Err(_) => defaults.ingest.max_desired_coverage,
        };

        let mut reassignment_groups = defaults.coverage.reassignment_groups;
        if env_bool("RADSHIFT_REASSIGN_MIDDAY").unwrap_or(false) {
            reassignment_groups.push(ReassignmentGroup::midday());
        }

        let level = std::env::var("RADSHIFT_LOG_LEVEL").unwrap_or(defaults.logging.level);
        let format = std::env::var("RADSHIFT_LOG_FORMAT").unwrap_or(defaults.logging.format);

        Ok(Self {
            database: DatabaseConfig { sqlite_path },
            ingest: IngestConfig {
                require_weekday_midc,
                max_rows,
                max_desired_coverage,
            },
            coverage: CoverageConfig {
                reassignment_groups,
            },
            logging: LoggingConfig { level, format },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.ingest.max_rows == 0 {
            anyhow::bail!("ingest.max_rows must be greater than 0");
        }
        if self.ingest.max_desired_coverage == 0 {
            anyhow::bail!("ingest.max_desired_coverage must be greater than 0");
        }

        let mut grouped = HashSet::new();
        for group in &self.coverage.reassignment_groups {
            if group.shift_types.is_empty() {
                anyhow::bail!("reassignment group '{}' has no shift types", group.name);
            }
            for shift_type in &group.shift_types {
                if !grouped.insert(*shift_type) {
                    anyhow::bail!(
                        "shift type {shift_type} appears in more than one reassignment group"
                    );
                }
            }
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!(
                "logging.format must be 'text' or 'json', got '{}'",
                self.logging.format
            );
        }

        Ok(())
    }

    /// Reassignment rules for coverage calculations
    #[must_use]
    pub fn reassignment_rules(&self) -> ReassignmentRules {
        ReassignmentRules::new(self.coverage.reassignment_groups.clone())
    }
}

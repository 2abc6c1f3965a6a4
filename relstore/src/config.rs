//! Store configuration module.
//!
//! This module loads the configuration of the `relstore` binary from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `RELSTORE_DATA_DIRECTORY`: Directory holding the block files (default: `./data`)
//! - `RELSTORE_DEMO_ROWS`: Number of rows the demo inserts (default: `1000`)
//! - `RELSTORE_KEEP_FILES`: Keep the demo's block files after it finishes (default: `false`)

use std::path::PathBuf;

const DATA_DIRECTORY_VAR: &str = "RELSTORE_DATA_DIRECTORY";
const DEMO_ROWS_VAR: &str = "RELSTORE_DEMO_ROWS";
const KEEP_FILES_VAR: &str = "RELSTORE_KEEP_FILES";

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory where block files are stored.
    /// Each table lives at `{data_directory}/{table}.db`.
    pub data_directory: PathBuf,
    /// Number of rows the demo inserts into its heap table.
    pub demo_rows: u32,
    /// Keep the demo's block files instead of dropping them on exit.
    pub keep_files: bool,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from(Self::DEFAULT_DATA_DIRECTORY),
            demo_rows: Self::DEFAULT_DEMO_ROWS,
            keep_files: false,
        }
    }
}

impl StoreConfig {
    /// Default data directory.
    pub const DEFAULT_DATA_DIRECTORY: &'static str = "./data";
    /// Default number of demo rows.
    pub const DEFAULT_DEMO_ROWS: u32 = 1000;

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `RELSTORE_DEMO_ROWS` is set but not a positive integer
    /// - `RELSTORE_KEEP_FILES` is set but not a boolean
    pub fn from_env() -> Result<Self, ConfigError> {
        let demo_rows = std::env::var(DEMO_ROWS_VAR).ok();
        let keep_files = std::env::var(KEEP_FILES_VAR).ok();
        Self::from_values(
            std::env::var(DATA_DIRECTORY_VAR).ok(),
            demo_rows.as_deref(),
            keep_files.as_deref(),
        )
    }

    /// Build a configuration from raw variable values, `None` meaning unset.
    fn from_values(
        data_directory: Option<String>,
        demo_rows: Option<&str>,
        keep_files: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let data_directory = data_directory
            .filter(|dir| !dir.is_empty())
            .map_or_else(|| PathBuf::from(Self::DEFAULT_DATA_DIRECTORY), PathBuf::from);

        let demo_rows = match demo_rows {
            Some(value) => parse_demo_rows(value)?,
            None => Self::DEFAULT_DEMO_ROWS,
        };

        let keep_files = match keep_files {
            Some(value) => parse_bool(KEEP_FILES_VAR, value)?,
            None => false,
        };

        Ok(Self {
            data_directory,
            demo_rows,
            keep_files,
        })
    }
}

fn parse_demo_rows(value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(rows) if rows > 0 => Ok(rows),
        _ => Err(ConfigError::InvalidValue {
            name: DEMO_ROWS_VAR.to_string(),
            message: format!("'{value}' is not a positive integer"),
        }),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not a boolean (expected true or false)"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        assert_eq!(StoreConfig::DEFAULT_DEMO_ROWS, 1000);
        assert_eq!(StoreConfig::DEFAULT_DATA_DIRECTORY, "./data");
        assert_eq!(
            StoreConfig::from_values(None, None, None).expect("defaults"),
            StoreConfig::default()
        );
    }

    #[test]
    fn test_values_override_defaults() {
        let config = StoreConfig::from_values(
            Some("/tmp/relstore".to_string()),
            Some("250"),
            Some("TRUE"),
        )
        .expect("valid config");
        assert_eq!(config.data_directory, PathBuf::from("/tmp/relstore"));
        assert_eq!(config.demo_rows, 250);
        assert!(config.keep_files);
    }

    #[test]
    fn test_invalid_demo_rows() {
        for value in ["0", "-4", "lots"] {
            let result = StoreConfig::from_values(None, Some(value), None);
            assert!(matches!(
                result,
                Err(ConfigError::InvalidValue { ref name, .. }) if name == "RELSTORE_DEMO_ROWS"
            ));
        }
    }

    #[test]
    fn test_invalid_keep_files() {
        let result = StoreConfig::from_values(None, None, Some("maybe"));
        assert_eq!(
            result,
            Err(ConfigError::InvalidValue {
                name: "RELSTORE_KEEP_FILES".to_string(),
                message: "'maybe' is not a boolean (expected true or false)".to_string(),
            })
        );
    }

    #[test]
    fn test_config_error_display_invalid() {
        let error = ConfigError::InvalidValue {
            name: "TEST_VAR".to_string(),
            message: "bad value".to_string(),
        };
        assert_eq!(error.to_string(), "invalid value for TEST_VAR: bad value");
    }
}

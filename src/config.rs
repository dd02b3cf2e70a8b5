use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Local alias a recipe uses for the table it is attached to, unless it declares its own
pub const DEFAULT_ROOT_ALIAS: &str = "entity";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Converter configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Ceiling for the passes of the join ordering loop
    #[validate(range(
        min = 1,
        max = 10000,
        message = "Max join iterations must be between 1 and 10000"
    ))]
    pub max_join_iterations: u32,

    /// Prefix of generated table aliases (`t1`, `t2`, ...)
    #[validate(custom(function = "validate_alias_prefix"))]
    pub table_alias_prefix: String,

    /// Prefix of generated column aliases (`c1`, `c2`, ...)
    #[validate(custom(function = "validate_alias_prefix"))]
    pub column_alias_prefix: String,

    /// Local alias bound to the owning table when a recipe declares none
    #[validate(length(min = 1, message = "Default root alias cannot be empty"))]
    pub default_root_alias: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            max_join_iterations: 100,
            table_alias_prefix: "t".to_string(),
            column_alias_prefix: "c".to_string(),
            default_root_alias: DEFAULT_ROOT_ALIAS.to_string(),
        }
    }
}

fn validate_alias_prefix(prefix: &str) -> Result<(), ValidationError> {
    let mut chars = prefix.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if starts_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ValidationError::new("alias_prefix")
            .with_message("Alias prefix must be a non-empty identifier".into()))
    }
}

impl ConverterConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            max_join_iterations: parse_env_var("QUERYDESIGNER_MAX_JOIN_ITERATIONS", "100")?,
            table_alias_prefix: env::var("QUERYDESIGNER_TABLE_ALIAS_PREFIX")
                .unwrap_or_else(|_| "t".to_string()),
            column_alias_prefix: env::var("QUERYDESIGNER_COLUMN_ALIAS_PREFIX")
                .unwrap_or_else(|_| "c".to_string()),
            default_root_alias: env::var("QUERYDESIGNER_DEFAULT_ROOT_ALIAS")
                .unwrap_or_else(|_| DEFAULT_ROOT_ALIAS.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_join_iterations: cli.max_join_iterations.unwrap_or(defaults.max_join_iterations),
            table_alias_prefix: cli.table_alias_prefix.unwrap_or(defaults.table_alias_prefix),
            column_alias_prefix: cli
                .column_alias_prefix
                .unwrap_or(defaults.column_alias_prefix),
            default_root_alias: defaults.default_root_alias,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides on top of a loaded configuration
    pub fn merge_cli(&mut self, cli: &CliConfig) -> Result<(), ConfigError> {
        if let Some(max) = cli.max_join_iterations {
            self.max_join_iterations = max;
        }
        if let Some(prefix) = &cli.table_alias_prefix {
            self.table_alias_prefix = prefix.clone();
        }
        if let Some(prefix) = &cli.column_alias_prefix {
            self.column_alias_prefix = prefix.clone();
        }
        self.validate()?;
        Ok(())
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub max_join_iterations: Option<u32>,
    pub table_alias_prefix: Option<String>,
    pub column_alias_prefix: Option<String>,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_join_iterations, 100);
        assert_eq!(config.table_alias_prefix, "t");
        assert_eq!(config.column_alias_prefix, "c");
    }

    #[test]
    fn test_invalid_iteration_ceiling() {
        let config = ConverterConfig {
            max_join_iterations: 0, // Invalid
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_alias_prefix() {
        for prefix in ["", "1t", "t-"] {
            let config = ConverterConfig {
                table_alias_prefix: prefix.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "`{prefix}` should be rejected");
        }
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("QUERYDESIGNER_MAX_JOIN_ITERATIONS", "7");
        env::set_var("QUERYDESIGNER_TABLE_ALIAS_PREFIX", "tbl");
        let config = ConverterConfig::from_env();
        env::remove_var("QUERYDESIGNER_MAX_JOIN_ITERATIONS");
        env::remove_var("QUERYDESIGNER_TABLE_ALIAS_PREFIX");

        let config = config.unwrap();
        assert_eq!(config.max_join_iterations, 7);
        assert_eq!(config.table_alias_prefix, "tbl");
        assert_eq!(config.column_alias_prefix, "c");
    }

    #[test]
    #[serial]
    fn test_from_env_parse_error() {
        env::set_var("QUERYDESIGNER_MAX_JOIN_ITERATIONS", "many");
        let result = ConverterConfig::from_env();
        env::remove_var("QUERYDESIGNER_MAX_JOIN_ITERATIONS");

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_from_yaml_file_uses_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_join_iterations: 10").unwrap();

        let config = ConverterConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.max_join_iterations, 10);
        assert_eq!(config.default_root_alias, "entity");
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = ConverterConfig::default();
        let cli = CliConfig {
            max_join_iterations: Some(3),
            ..Default::default()
        };
        config.merge_cli(&cli).unwrap();
        assert_eq!(config.max_join_iterations, 3);

        let bad = CliConfig {
            column_alias_prefix: Some(String::new()),
            ..Default::default()
        };
        assert!(ConverterConfig::from_cli(bad).is_err());
    }
}

//! Configuration: `.env` loading, YAML app config and database settings.

use crate::ingestion::utils::is_valid_identifier;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const API_KEY_VAR: &str = "EXCHANGE_RATE_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    MissingEnv(&'static str),

    #[error("missing required database configuration: {0:?}")]
    MissingDatabaseConfig(Vec<&'static str>),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to load .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

/// Application config read from `configs/default.yaml`
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub etl: EtlConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// May contain `{base_currency}`
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EtlConfig {
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_sample_file")]
    pub sample_file: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sample_file: default_sample_file(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_sample_file() -> PathBuf {
    PathBuf::from("data/raw/sample_rates.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/processed")
}

/// Load variables from `env_path`, or from `./.env` when it exists.
pub fn load_environment(env_path: Option<&Path>) -> Result<(), ConfigError> {
    match env_path {
        Some(path) => {
            info!("Loading environment variables from {}", path.display());
            dotenvy::from_path(path).map_err(|e| {
                error!("Failed to load .env file: {}", e);
                ConfigError::Dotenv(e)
            })?;
        }
        None => match dotenvy::dotenv() {
            Ok(path) => info!("Loaded environment variables from {}", path.display()),
            Err(e) if e.not_found() => info!("No .env file found, using process environment"),
            Err(e) => {
                error!("Failed to load .env file: {}", e);
                return Err(ConfigError::Dotenv(e));
            }
        },
    }

    Ok(())
}

/// Read the YAML application config
pub fn load_configuration(config_path: &Path) -> Result<AppConfig, ConfigError> {
    info!("Loading configuration from YAML file: {}", config_path.display());

    let content = std::fs::read_to_string(config_path).map_err(|source| {
        error!("Configuration file not found: {}", config_path.display());
        ConfigError::Io {
            path: config_path.to_path_buf(),
            source,
        }
    })?;

    let config: AppConfig = serde_yaml::from_str(&content)?;
    info!("Configuration loaded successfully");
    Ok(config)
}

/// Read the provider API key from the environment
pub fn api_key_from_env() -> Result<String, ConfigError> {
    std::env::var(API_KEY_VAR)
        .ok()
        .filter(|key| !key.is_empty())
        .ok_or(ConfigError::MissingEnv(API_KEY_VAR))
}

/// `{base_url}/{api_key}/{endpoint}` with `{base_currency}` substituted
pub fn construct_api_url(config: &AppConfig, api_key: &str) -> Result<String, ConfigError> {
    if api_key.is_empty() {
        return Err(ConfigError::MissingEnv(API_KEY_VAR));
    }

    let base_url = config.api.base_url.trim_end_matches('/');
    let endpoint = config
        .api
        .endpoint
        .trim_start_matches('/')
        .replace("{base_currency}", &config.etl.base_currency);

    Ok(format!("{base_url}/{api_key}/{endpoint}"))
}

/// Database settings from `DB_*` environment variables
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub table: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"*******")
            .field("table", &self.table)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        info!("Loading database configuration from environment variables");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; used with the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let port = match get("DB_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "DB_PORT",
                reason: format!("{raw:?}: {e}"),
            })?,
            None => 3306,
        };

        let database = get("DB_NAME");
        let user = get("DB_USER");
        let password = get("DB_PASSWORD");

        let missing: Vec<&'static str> = [
            ("DB_NAME", database.is_none()),
            ("DB_USER", user.is_none()),
            ("DB_PASSWORD", password.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, absent)| absent.then_some(key))
        .collect();

        let (Some(database), Some(user), Some(password)) = (database, user, password) else {
            error!("Missing required database configuration: {:?}", missing);
            return Err(ConfigError::MissingDatabaseConfig(missing));
        };

        let table = get("DB_TABLE").unwrap_or_else(|| "exchange_rates".to_string());
        if !is_valid_identifier(&table) {
            return Err(ConfigError::Invalid {
                key: "DB_TABLE",
                reason: format!("{table:?} is not a valid table name"),
            });
        }

        Ok(DatabaseConfig {
            host: get("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port,
            database,
            user,
            password,
            table,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    fn app_config() -> AppConfig {
        serde_yaml::from_str(
            r#"
api:
  base_url: "https://v6.exchangerate-api.com/v6/"
  endpoint: "/latest/{base_currency}"
etl:
  base_currency: "EUR"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_load_database_config() {
        let config = DatabaseConfig::from_lookup(lookup(&[
            ("DB_HOST", "h"),
            ("DB_PORT", "1234"),
            ("DB_USER", "u"),
            ("DB_PASSWORD", "p"),
            ("DB_NAME", "d"),
            ("DB_TABLE", "t"),
        ]))
        .unwrap();

        assert_eq!(config.host, "h");
        assert_eq!(config.port, 1234);
        assert_eq!(config.table, "t");
        assert!(!format!("{config:?}").contains("\"p\""));
    }

    #[test]
    fn test_database_defaults() {
        let config = DatabaseConfig::from_lookup(lookup(&[
            ("DB_USER", "u"),
            ("DB_PASSWORD", "p"),
            ("DB_NAME", "d"),
        ]))
        .unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 3306);
        assert_eq!(config.table, "exchange_rates");
    }

    #[test]
    fn test_missing_db_env() {
        let err = DatabaseConfig::from_lookup(lookup(&[("DB_NAME", "d")])).unwrap_err();

        match err {
            ConfigError::MissingDatabaseConfig(missing) => {
                assert_eq!(missing, vec!["DB_USER", "DB_PASSWORD"]);
            }
            other => panic!("expected MissingDatabaseConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_port_and_table() {
        let base = [("DB_USER", "u"), ("DB_PASSWORD", "p"), ("DB_NAME", "d")];

        let mut vars = base.to_vec();
        vars.push(("DB_PORT", "not-a-port"));
        assert!(matches!(
            DatabaseConfig::from_lookup(lookup(&vars)),
            Err(ConfigError::Invalid { key: "DB_PORT", .. })
        ));

        let mut vars = base.to_vec();
        vars.push(("DB_TABLE", "rates; DROP TABLE x"));
        assert!(matches!(
            DatabaseConfig::from_lookup(lookup(&vars)),
            Err(ConfigError::Invalid { key: "DB_TABLE", .. })
        ));
    }

    #[test]
    fn test_load_configuration() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("cfg.yaml");
        std::fs::write(
            &path,
            "api:\n  base_url: \"http://x\"\n  endpoint: \"latest/USD\"\netl:\n  base_currency: \"ABC\"\n",
        )
        .unwrap();

        let config = load_configuration(&path).unwrap();

        assert_eq!(config.api.base_url, "http://x");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.etl.base_currency, "ABC");
        assert_eq!(config.paths.output_dir, PathBuf::from("data/processed"));
    }

    #[test]
    fn test_load_configuration_errors() {
        let temp = tempdir().unwrap();

        let missing = load_configuration(&temp.path().join("nope.yaml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let path = temp.path().join("bad.yaml");
        std::fs::write(&path, "etl: [unterminated").unwrap();
        assert!(matches!(load_configuration(&path), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_bundled_default_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/default.yaml");
        let config = load_configuration(&path).unwrap();
        assert_eq!(config.etl.base_currency, "USD");
    }

    #[test]
    fn test_construct_api_url() {
        let url = construct_api_url(&app_config(), "secret-key").unwrap();
        assert_eq!(url, "https://v6.exchangerate-api.com/v6/secret-key/latest/EUR");

        assert!(matches!(
            construct_api_url(&app_config(), ""),
            Err(ConfigError::MissingEnv(API_KEY_VAR))
        ));
    }

    #[test]
    fn test_load_environment_with_explicit_path() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("custom.env");
        std::fs::write(&path, "RATES_ETL_CUSTOM_VAR=42\n").unwrap();

        load_environment(Some(&path)).unwrap();

        assert_eq!(std::env::var("RATES_ETL_CUSTOM_VAR").unwrap(), "42");
    }

    #[test]
    fn test_load_environment_missing_explicit_path() {
        let temp = tempdir().unwrap();
        let result = load_environment(Some(&temp.path().join("absent.env")));
        assert!(matches!(result, Err(ConfigError::Dotenv(_))));
    }
}

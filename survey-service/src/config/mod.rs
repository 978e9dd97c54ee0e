use config::{Config as Cfg, ConfigError, Environment, File};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "config.ini";

#[derive(Debug, Clone)]
pub struct SurveyConfig {
    pub common: core_config::Config,
    pub store: StoreBackend,
    pub mongodb: MongoConfig,
    pub catalog: CatalogConfig,
}

/// `[MONGODB]` section of `config.ini`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MongoConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_mongo_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogConfig {
    /// Insert the starter products when the catalog collection is empty.
    #[serde(default = "default_seed")]
    pub seed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_mongo_port() -> u16 {
    27017
}

fn default_database() -> String {
    "social_media_analysis".to_string()
}

fn default_max_pool_size() -> u32 {
    10
}

fn default_operation_timeout_secs() -> u64 {
    5
}

fn default_seed() -> bool {
    true
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_mongo_port(),
            database: default_database(),
            max_pool_size: default_max_pool_size(),
            operation_timeout_secs: default_operation_timeout_secs(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

impl MongoConfig {
    pub fn uri(&self) -> String {
        format!("mongodb://{}:{}/", self.host, self.port)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

impl SurveyConfig {
    /// Load from `SURVEY_CONFIG` (default `config.ini`) layered under
    /// `SURVEY__<SECTION>__<KEY>` environment overrides.
    pub fn load() -> Result<Self, AppError> {
        let path = env::var("SURVEY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let settings = Cfg::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("SURVEY").separator("__"))
            .build()?;

        let store = env::var("SURVEY_STORE")
            .unwrap_or_else(|_| "mongo".to_string())
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        Ok(SurveyConfig {
            common,
            store,
            mongodb: section(&settings, "mongodb")?,
            catalog: section(&settings, "catalog")?,
        })
    }

    /// Configuration for tests and local runs: in-memory store, ephemeral port.
    pub fn in_memory() -> Self {
        SurveyConfig {
            common: core_config::Config {
                port: 0,
                ..core_config::Config::default()
            },
            store: StoreBackend::Memory,
            mongodb: MongoConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

/// Deserialize one INI section. Section headers are conventionally upper case
/// (`[MONGODB]`) while environment overrides arrive lower case, so both
/// spellings are tried before falling back to defaults.
fn section<T>(settings: &Cfg, name: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    for key in [name.to_lowercase(), name.to_uppercase()] {
        match settings.get::<T>(&key) {
            Ok(value) => return Ok(value),
            Err(ConfigError::NotFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(T::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn settings(ini: &str) -> Cfg {
        Cfg::builder()
            .add_source(File::from_str(ini, FileFormat::Ini))
            .build()
            .unwrap()
    }

    #[test]
    fn reads_mongodb_section_host_and_port() {
        let settings = settings("[MONGODB]\nhost = db.internal\nport = 27018\n");

        let mongo: MongoConfig = section(&settings, "mongodb").unwrap();

        assert_eq!(mongo.host, "db.internal");
        assert_eq!(mongo.port, 27018);
        assert_eq!(mongo.database, "social_media_analysis");
        assert_eq!(mongo.uri(), "mongodb://db.internal:27018/");
    }

    #[test]
    fn missing_section_falls_back_to_defaults() {
        let settings = settings("[OTHER]\nkey = value\n");

        let mongo: MongoConfig = section(&settings, "mongodb").unwrap();
        let catalog: CatalogConfig = section(&settings, "catalog").unwrap();

        assert_eq!(mongo, MongoConfig::default());
        assert!(catalog.seed);
    }

    #[test]
    fn operation_timeout_is_in_seconds() {
        let mongo = MongoConfig {
            operation_timeout_secs: 3,
            ..MongoConfig::default()
        };
        assert_eq!(mongo.operation_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn store_backend_parses_case_insensitively() {
        assert_eq!("Memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("mongodb".parse::<StoreBackend>(), Ok(StoreBackend::Mongo));
        assert!("redis".parse::<StoreBackend>().is_err());
    }
}

//! Application configuration
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional TOML file, then `OPCG__SECTION__KEY` environment variables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::language::Language;
use crate::infrastructure::http_client::HttpClientConfig;
use crate::infrastructure::sources::{OfficialSiteConfig, PriceApiConfig};

pub const APP_DIR_NAME: &str = "opcg-catalog";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const ENV_PREFIX: &str = "OPCG";
pub const ENV_SEPARATOR: &str = "__";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub http: HttpClientConfig,
    pub sources: SourcesConfig,
    pub import: ImportConfig,
    pub catalog: CatalogConfig,
    pub verification: VerificationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlite:` URL of the catalog database
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "error", "warn", "info", "debug" or "trace"
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Log directory; `<data dir>/logs` when unset
    pub directory: Option<PathBuf>,
    /// Number of log files kept when cleaning up
    pub max_files: u32,
    pub auto_cleanup_logs: bool,
    /// Per-target levels, e.g. `sqlx = "warn"`
    pub module_filters: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub jp: OfficialSiteConfig,
    pub en: OfficialSiteConfig,
    pub prices: PriceApiConfig,
}

impl SourcesConfig {
    pub fn official(&self, language: Language) -> &OfficialSiteConfig {
        match language {
            Language::Jp => &self.jp,
            Language::En => &self.en,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Pause between series during a full import
    pub series_delay_ms: u64,
    /// Leave series that already have versions alone
    pub skip_populated: bool,
    /// Overwrite card text of existing cards with freshly scraped text
    pub refresh_card_text: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub per_page: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// A series is rescraped when it holds fewer than this share of its
    /// expected cards
    pub rescrape_threshold: f64,
    /// Ask the source for its own per-series counts as well
    pub check_reported_counts: bool,
}

pub mod defaults {
    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_MAX_FILES: u32 = 7;
    pub const LOG_AUTO_CLEANUP: bool = true;

    pub const DATABASE_FILE: &str = "opcg.db";

    pub const SERIES_DELAY_MS: u64 = 2000;
    pub const SKIP_POPULATED: bool = false;
    pub const REFRESH_CARD_TEXT: bool = false;

    pub const PER_PAGE: i64 = 24;

    pub const RESCRAPE_THRESHOLD: f64 = crate::domain::constants::import::RESCRAPE_THRESHOLD;
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = AppConfig::data_dir().join(defaults::DATABASE_FILE);
        Self {
            url: format!("sqlite:{}", path.display()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let module_filters = [("sqlx", "warn"), ("reqwest", "info"), ("hyper", "warn"), ("html5ever", "warn")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            directory: None,
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
            module_filters,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            jp: OfficialSiteConfig::for_language(Language::Jp),
            en: OfficialSiteConfig::for_language(Language::En),
            prices: PriceApiConfig::default(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            series_delay_ms: defaults::SERIES_DELAY_MS,
            skip_populated: defaults::SKIP_POPULATED,
            refresh_card_text: defaults::REFRESH_CARD_TEXT,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            per_page: defaults::PER_PAGE,
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            rescrape_threshold: defaults::RESCRAPE_THRESHOLD,
            check_reported_counts: false,
        }
    }
}

impl AppConfig {
    /// Load configuration. An explicit `path` must exist; otherwise the
    /// default config file is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = config::Config::try_from(&AppConfig::default())?;

        let file = match path {
            Some(p) => config::File::from(p.to_path_buf()).required(true),
            None => config::File::from(Self::default_config_path()).required(false),
        };

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.max_requests_per_second == 0 {
            return Err(ConfigError::Validation {
                message: "http.max_requests_per_second must be greater than 0".to_string(),
            });
        }
        if self.http.timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                message: "http.timeout_seconds must be greater than 0".to_string(),
            });
        }
        if self.http.retry.base_delay_ms > self.http.retry.max_delay_ms {
            return Err(ConfigError::Validation {
                message: "http.retry.base_delay_ms cannot exceed max_delay_ms".to_string(),
            });
        }
        if self.catalog.per_page <= 0 {
            return Err(ConfigError::Validation {
                message: "catalog.per_page must be greater than 0".to_string(),
            });
        }
        let threshold = self.verification.rescrape_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Validation {
                message: format!("verification.rescrape_threshold must be in (0, 1], got {threshold}"),
            });
        }
        if !self.database.url.starts_with("sqlite:") {
            return Err(ConfigError::Validation {
                message: format!("database.url must be a sqlite: URL, got {}", self.database.url),
            });
        }
        Ok(())
    }

    /// Per-user data directory; falls back to `./data` when the platform has none
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir().map_or_else(|| PathBuf::from("data"), |dir| dir.join(APP_DIR_NAME))
    }

    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .map_or_else(|| PathBuf::from("."), |dir| dir.join(APP_DIR_NAME))
            .join(CONFIG_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.logging
            .directory
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.catalog.per_page, 24);
        assert!(config.database.url.starts_with("sqlite:"));
        assert_eq!(config.sources.official(Language::En).base_url, "https://en.onepiece-cardgame.com");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(
            file,
            "[catalog]\nper_page = 50\n\n[import]\nseries_delay_ms = 0\n\n[sources.prices]\nrequest_delay_ms = 5"
        )
        .expect("write");

        let config = AppConfig::load(Some(&path)).expect("load");
        assert_eq!(config.catalog.per_page, 50);
        assert_eq!(config.import.series_delay_ms, 0);
        assert_eq!(config.sources.prices.request_delay_ms, 5);
        assert_eq!(config.http.max_requests_per_second, HttpClientConfig::default().max_requests_per_second);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = AppConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::FileLoad { .. })));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut config = AppConfig::default();
        config.verification.rescrape_threshold = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));

        config.verification.rescrape_threshold = 0.9;
        config.catalog.per_page = 0;
        assert!(config.validate().is_err());
    }
}

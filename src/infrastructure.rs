//! Infrastructure layer: SQLite persistence, HTTP fetching, listing parsing,
//! configuration and logging.

pub mod catalog_repository;
pub mod config;
pub mod database_connection;
pub mod fetch_error;
pub mod http_client;
pub mod import_run_repository;
pub mod logging;
pub mod parsing;
pub mod price_repository;
pub mod retry_policy;
pub mod rows;
pub mod sources;
pub mod user_repository;

pub use catalog_repository::{CatalogRepository, CatalogTransaction, ClearReport, PrintMove, VersionRef};
pub use config::{AppConfig, ConfigError};
pub use database_connection::DatabaseConnection;
pub use fetch_error::{FetchError, FetchResult};
pub use http_client::{HttpClient, HttpClientConfig};
pub use import_run_repository::{ImportRun, ImportRunRepository, RunStatus, RunTotals};
pub use logging::init_logging;
pub use parsing::{ListingParser, ListingSelectors, ParsingError};
pub use price_repository::PriceRepository;
pub use retry_policy::RetryPolicy;
pub use sources::{CardSource, OfficialSiteSource, PriceApiClient, PriceSource};
pub use user_repository::UserRepository;

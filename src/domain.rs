//! Domain module - catalog entities and reconciliation rules
//!
//! Plain data types plus the pure rules that keep card identity stable
//! across reprints. Nothing here touches the database or the network.

pub mod card;
pub mod collection;
pub mod constants;
pub mod deck;
pub mod errors;
pub mod language;
pub mod price;
pub mod query;
pub mod reconciliation;
pub mod series;
pub mod user;

// Re-export commonly used items for convenience
pub use card::{Card, CardDraft, CardImage, CardSeriesLink, CardVersion, VersionType};
pub use errors::{CatalogError, CatalogResult};
pub use language::Language;
pub use price::{NewPrice, PriceQuote, PriceRecord};
pub use query::{CardFilter, Page};
pub use series::{Series, SeriesDraft, SeriesType};

//! Catalog error types
//!
//! Errors that callers branch on (missing rows, uniqueness violations,
//! invalid input). Infrastructure failures travel as `anyhow::Error` with
//! context attached; services downcast to `CatalogError` when they need to.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Card {card_number} ({language}) not found")]
    CardNotFound {
        card_number: String,
        language: String,
    },

    #[error("Series {code} ({language}) not found")]
    SeriesNotFound { code: String, language: String },

    #[error("Card version {0} not found")]
    VersionNotFound(i64),

    #[error("Deck '{0}' not found")]
    DeckNotFound(String),

    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("User with {field} '{value}' already exists")]
    DuplicateUser { field: String, value: String },

    #[error("Unsupported language: {0}")]
    InvalidLanguage(String),

    #[error("Quantity must be at least 1 (got {0})")]
    InvalidQuantity(i64),

    #[error("Cannot clear {language} data: {references} user records still reference its versions")]
    LanguageInUse { language: String, references: i64 },
}

impl CatalogError {
    /// Whether the error means "the thing asked for does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CardNotFound { .. }
                | Self::SeriesNotFound { .. }
                | Self::VersionNotFound(_)
                | Self::DeckNotFound(_)
                | Self::UserNotFound(_)
        )
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

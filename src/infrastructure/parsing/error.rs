//! Errors raised while extracting data from listing pages

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParsingError {
    #[error("Invalid CSS selector for {field}: {selector} - {reason}")]
    InvalidSelector {
        field: String,
        selector: String,
        reason: String,
    },

    #[error("Required field '{field}' not found in {context}")]
    RequiredFieldMissing { field: String, context: String },

    #[error("No series options found (tried {tried_selectors:?})")]
    NoSeriesFound { tried_selectors: Vec<String> },

    #[error("URL resolution failed: {url} - {reason}")]
    UrlResolutionFailed { url: String, reason: String },
}

impl ParsingError {
    pub fn required_field_missing(field: &str, context: impl Into<String>) -> Self {
        Self::RequiredFieldMissing {
            field: field.to_string(),
            context: context.into(),
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;

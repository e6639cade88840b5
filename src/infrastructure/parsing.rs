//! HTML extraction for the official card list
//!
//! The parser is driven entirely by [`ListingSelectors`]; it knows how to
//! select elements and read their text or attributes, nothing more.

pub mod config;
pub mod error;
pub mod listing_parser;

pub use config::ListingSelectors;
pub use error::{ParsingError, ParsingResult};
pub use listing_parser::ListingParser;

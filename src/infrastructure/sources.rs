//! Where catalog and price data come from
//!
//! Services only see the [`CardSource`] and [`PriceSource`] traits, so tests
//! can feed them canned listings.

pub mod official_site;
pub mod price_api;

pub use official_site::{OfficialSiteConfig, OfficialSiteSource};
pub use price_api::{PriceApiClient, PriceApiConfig};

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::card::CardDraft;
use crate::domain::language::Language;
use crate::domain::price::PriceQuote;
use crate::domain::series::SeriesDraft;

/// A card list for one language
#[async_trait]
pub trait CardSource: Send + Sync {
    fn language(&self) -> Language;

    /// Every series the source offers, in listing order
    async fn series_list(&self) -> Result<Vec<SeriesDraft>>;

    /// All card prints of one series in listing order, version indices assigned
    async fn series_cards(&self, official_id: &str) -> Result<Vec<CardDraft>>;

    /// Illustration kind keyed by official modal id
    async fn illustration_types(&self, official_id: &str) -> Result<HashMap<String, String>>;

    /// Card count the source itself reports for a series, when it shows one
    async fn reported_count(&self, _official_id: &str) -> Result<Option<i64>> {
        Ok(None)
    }
}

/// Market prices per card number
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Name stored in `price_history.source`
    fn name(&self) -> &str;

    /// Currency of the quoted prices
    fn currency(&self) -> &str;

    /// Quotes for every printing of a card number; unknown numbers give none
    async fn quotes_for(&self, card_number: &str) -> Result<Vec<PriceQuote>>;
}

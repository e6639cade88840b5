//! Daily price collection from a price source

use anyhow::Result;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::pause;
use crate::domain::card::{CardVersion, VersionType};
use crate::domain::constants::prices::{DEFAULT_CONDITION, DEFAULT_PRICE_TYPE};
use crate::domain::language::Language;
use crate::domain::price::{NewPrice, PriceQuote};
use crate::infrastructure::catalog_repository::CatalogRepository;
use crate::infrastructure::price_repository::PriceRepository;
use crate::infrastructure::sources::PriceSource;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriceUpdateReport {
    pub cards_checked: usize,
    pub quotes_seen: usize,
    /// New daily records written
    pub recorded: usize,
    /// Quotes with no usable market price
    pub no_price: usize,
    /// Quotes for card numbers the catalog does not hold
    pub unknown_cards: usize,
    /// Already recorded today
    pub duplicates: usize,
    pub failed_cards: Vec<String>,
}

pub struct PriceService {
    catalog: CatalogRepository,
    prices: PriceRepository,
    language: Language,
    request_delay: Duration,
    cancel: CancellationToken,
}

impl PriceService {
    pub fn new(
        catalog: CatalogRepository,
        prices: PriceRepository,
        language: Language,
        request_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            catalog,
            prices,
            language,
            request_delay,
            cancel,
        }
    }

    /// Fetch quotes for every card of the price language (optionally only
    /// cards of one primary series, optionally at most `limit` cards) and
    /// record one price per version per day.
    pub async fn update_prices(
        &self,
        source: &dyn PriceSource,
        series_code: Option<&str>,
        limit: Option<i64>,
    ) -> Result<PriceUpdateReport> {
        let cards = self
            .catalog
            .cards_for_language(self.language, series_code, limit)
            .await?;
        info!("Updating {} prices for {} {} cards", source.name(), cards.len(), self.language);

        let mut report = PriceUpdateReport::default();
        for (i, card) in cards.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            report.cards_checked += 1;

            match source.quotes_for(&card.card_number).await {
                Ok(quotes) => {
                    for quote in &quotes {
                        report.quotes_seen += 1;
                        self.record_quote(source, quote, &mut report).await?;
                    }
                }
                Err(e) => {
                    warn!("Price lookup for {} failed: {:#}", card.card_number, e);
                    report.failed_cards.push(card.card_number.clone());
                }
            }

            if (i + 1) % 50 == 0 {
                info!("Prices: {}/{} cards, {} recorded", i + 1, cards.len(), report.recorded);
            }
            if i + 1 < cards.len() && !pause(self.request_delay, &self.cancel).await {
                break;
            }
        }

        info!(
            "Prices done: {} cards, {} recorded, {} without price, {} unknown, {} failed",
            report.cards_checked,
            report.recorded,
            report.no_price,
            report.unknown_cards,
            report.failed_cards.len()
        );
        Ok(report)
    }

    async fn record_quote(
        &self,
        source: &dyn PriceSource,
        quote: &PriceQuote,
        report: &mut PriceUpdateReport,
    ) -> Result<()> {
        let Some(price) = quote.usable_price() else {
            report.no_price += 1;
            return Ok(());
        };
        let Some(card) = self.catalog.find_card(&quote.card_number, self.language).await? else {
            debug!("Quote for unknown card {}", quote.card_number);
            report.unknown_cards += 1;
            return Ok(());
        };

        let versions = self.catalog.versions_for_card(card.id).await?;
        let Some(version) = pick_version(&versions, quote.is_alt_art) else {
            debug!("Card {} has no versions to price", card.card_number);
            report.unknown_cards += 1;
            return Ok(());
        };

        let record = NewPrice {
            version_id: version.id,
            source: source.name().to_string(),
            currency: source.currency().to_string(),
            price,
            condition: DEFAULT_CONDITION.to_string(),
            price_type: DEFAULT_PRICE_TYPE.to_string(),
            listing_count: None,
            source_url: None,
        };
        if self.prices.record_daily_price(&record).await? {
            report.recorded += 1;
        } else {
            report.duplicates += 1;
        }
        Ok(())
    }
}

/// The first version of the quoted kind, else the card's first version
pub fn pick_version(versions: &[CardVersion], alt_art: bool) -> Option<&CardVersion> {
    let wanted = if alt_art { VersionType::AltArt } else { VersionType::Normal };
    versions
        .iter()
        .find(|v| v.version_type == wanted)
        .or_else(|| versions.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn version(id: i64, version_type: VersionType) -> CardVersion {
        let now = Utc::now();
        CardVersion {
            id,
            card_id: 1,
            series_id: 1,
            version_type,
            version_suffix: String::new(),
            has_star_mark: false,
            rarity_variant: None,
            source_description: None,
            illustration_type: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn alt_art_quote_prefers_alt_art_version() {
        let versions = vec![version(1, VersionType::Normal), version(2, VersionType::AltArt)];
        assert_eq!(pick_version(&versions, true).map(|v| v.id), Some(2));
        assert_eq!(pick_version(&versions, false).map(|v| v.id), Some(1));
    }

    #[test]
    fn falls_back_to_first_version() {
        let versions = vec![version(7, VersionType::Normal)];
        assert_eq!(pick_version(&versions, true).map(|v| v.id), Some(7));
        assert!(pick_version(&[], false).is_none());
    }
}

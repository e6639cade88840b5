//! Price history records and quotes from price sources

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const CURRENCY_JPY: &str = "JPY";
pub const CURRENCY_USD: &str = "USD";

/// Marker in a price-API product name that identifies alternate art prints
const ALT_ART_MARKER: &str = "Alternate Art";

/// One stored price observation for a card version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub id: i64,
    pub version_id: i64,
    pub source: String,
    pub currency: String,
    pub price: f64,
    pub condition: String,
    pub price_type: String,
    pub listing_count: Option<i32>,
    pub source_url: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl PriceRecord {
    pub fn display_price(&self) -> String {
        display_price(self.price, &self.currency)
    }
}

/// Price to insert; `recorded_at` is assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrice {
    pub version_id: i64,
    pub source: String,
    pub currency: String,
    pub price: f64,
    pub condition: String,
    pub price_type: String,
    pub listing_count: Option<i32>,
    pub source_url: Option<String>,
}

/// A market quote for one printing of a card number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub card_number: String,
    pub name: String,
    pub market_price: Option<f64>,
    pub inventory_price: Option<f64>,
    pub is_alt_art: bool,
    pub image_id: Option<String>,
    pub date_scraped: Option<NaiveDate>,
}

impl PriceQuote {
    pub fn new(card_number: impl Into<String>, name: impl Into<String>, market_price: Option<f64>) -> Self {
        let name = name.into();
        Self {
            card_number: card_number.into(),
            is_alt_art: name.contains(ALT_ART_MARKER),
            name,
            market_price,
            inventory_price: None,
            image_id: None,
            date_scraped: None,
        }
    }

    /// Market price when it is present and positive
    pub fn usable_price(&self) -> Option<f64> {
        self.market_price.filter(|p| *p > 0.0)
    }
}

/// Format a price for display: `¥1,234` for yen, `$1,234.50` for dollars,
/// `"<price> <currency>"` otherwise.
pub fn display_price(price: f64, currency: &str) -> String {
    match currency {
        CURRENCY_JPY => format!("¥{}", group_thousands(&format!("{price:.0}"))),
        CURRENCY_USD => format!("${}", group_thousands(&format!("{price:.2}"))),
        _ => format!("{price} {currency}"),
    }
}

fn group_thousands(formatted: &str) -> String {
    let (sign, unsigned) = formatted
        .strip_prefix('-')
        .map_or(("", formatted), |rest| ("-", rest));
    let (int_part, frac_part) = unsigned
        .split_once('.')
        .map_or((unsigned, None), |(i, f)| (i, Some(f)));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

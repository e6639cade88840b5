//! Client for the public OPTCG price API

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::PriceSource;
use crate::domain::constants::prices::API_SOURCE;
use crate::domain::language::Language;
use crate::domain::price::{PriceQuote, CURRENCY_USD};
use crate::infrastructure::fetch_error::FetchError;
use crate::infrastructure::http_client::HttpClient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceApiConfig {
    pub base_url: String,
    /// Pause between card lookups
    pub request_delay_ms: u64,
    /// Catalog language whose cards are priced
    pub card_language: Language,
}

impl Default for PriceApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://optcgapi.com/api".to_string(),
            request_delay_ms: 300,
            card_language: Language::Jp,
        }
    }
}

/// One entry of `/sets/card/{number}/`
#[derive(Debug, Deserialize)]
struct ApiCard {
    card_set_id: Option<String>,
    card_name: Option<String>,
    market_price: Option<Value>,
    inventory_price: Option<Value>,
    card_image_id: Option<Value>,
    date_scraped: Option<String>,
}

impl ApiCard {
    fn into_quote(self, requested: &str) -> PriceQuote {
        let number = self
            .card_set_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| requested.to_string());
        let mut quote = PriceQuote::new(
            number,
            self.card_name.unwrap_or_default(),
            self.market_price.as_ref().and_then(number_value),
        );
        quote.inventory_price = self.inventory_price.as_ref().and_then(number_value);
        quote.image_id = self.card_image_id.as_ref().and_then(text_value);
        quote.date_scraped = self.date_scraped.as_deref().and_then(parse_date);
        quote
    }
}

/// Prices arrive as numbers or numeric strings
fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    raw.get(..10).and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
}

pub struct PriceApiClient {
    http: Arc<HttpClient>,
    config: PriceApiConfig,
    cancel: CancellationToken,
}

impl PriceApiClient {
    pub fn new(http: Arc<HttpClient>, config: PriceApiConfig, cancel: CancellationToken) -> Self {
        Self { http, config, cancel }
    }

    pub fn config(&self) -> &PriceApiConfig {
        &self.config
    }

    fn card_url(&self, card_number: &str) -> String {
        format!("{}/sets/card/{}/", self.config.base_url.trim_end_matches('/'), card_number)
    }
}

#[async_trait]
impl PriceSource for PriceApiClient {
    fn name(&self) -> &str {
        API_SOURCE
    }

    fn currency(&self) -> &str {
        CURRENCY_USD
    }

    async fn quotes_for(&self, card_number: &str) -> Result<Vec<PriceQuote>> {
        let url = self.card_url(card_number);
        let entries: Vec<ApiCard> = match self.http.get_json(&url, &self.cancel).await {
            Ok(entries) => entries,
            Err(FetchError::Status { status: 404, .. }) => {
                tracing::debug!("No price entries for {}", card_number);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to fetch prices for {card_number}")),
        };

        Ok(entries.into_iter().map(|entry| entry.into_quote(card_number)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_entries_map_to_quotes() {
        let body = r#"[
            {"card_set_id": "OP01-001", "card_name": "Roronoa Zoro", "market_price": 1.25,
             "inventory_price": "0.99", "card_image_id": "OP01-001", "date_scraped": "2025-01-31T04:00:00"},
            {"card_set_id": "OP01-001", "card_name": "Roronoa Zoro (Alternate Art)", "market_price": null,
             "inventory_price": null, "card_image_id": 1234, "date_scraped": null}
        ]"#;
        let entries: Vec<ApiCard> = serde_json::from_str(body).expect("valid json");
        let quotes: Vec<PriceQuote> = entries.into_iter().map(|e| e.into_quote("OP01-001")).collect();

        assert_eq!(quotes[0].market_price, Some(1.25));
        assert_eq!(quotes[0].inventory_price, Some(0.99));
        assert!(!quotes[0].is_alt_art);
        assert_eq!(quotes[0].date_scraped, NaiveDate::from_ymd_opt(2025, 1, 31));

        assert!(quotes[1].is_alt_art);
        assert_eq!(quotes[1].usable_price(), None);
        assert_eq!(quotes[1].image_id.as_deref(), Some("1234"));
    }

    #[test]
    fn missing_card_number_falls_back_to_requested() {
        let entry: ApiCard = serde_json::from_str(r#"{"card_name": "x", "market_price": "3.5"}"#).expect("json");
        let quote = entry.into_quote("ST01-001");
        assert_eq!(quote.card_number, "ST01-001");
        assert_eq!(quote.market_price, Some(3.5));
    }
}

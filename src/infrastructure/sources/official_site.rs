//! Official card list site as a [`CardSource`]

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::CardSource;
use crate::domain::card::CardDraft;
use crate::domain::language::Language;
use crate::domain::series::SeriesDraft;
use crate::infrastructure::fetch_error::{FetchError, FetchResult};
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::parsing::{ListingParser, ListingSelectors};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfficialSiteConfig {
    pub base_url: String,
    /// Card list page, relative to `base_url`
    pub card_list_path: String,
    /// Query parameter selecting a series on the card list page
    pub series_param: String,
    pub selectors: ListingSelectors,
}

impl OfficialSiteConfig {
    pub fn for_language(language: Language) -> Self {
        let base_url = match language {
            Language::Jp => "https://www.onepiece-cardgame.com",
            Language::En => "https://en.onepiece-cardgame.com",
        };
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn card_list_url(&self) -> FetchResult<Url> {
        let invalid = |url: &str, e: url::ParseError| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let base = Url::parse(&format!("{}/", self.base_url.trim_end_matches('/')))
            .map_err(|e| invalid(&self.base_url, e))?;
        base.join(&self.card_list_path)
            .map_err(|e| invalid(&self.card_list_path, e))
    }

    pub fn series_url(&self, official_id: &str) -> FetchResult<String> {
        let mut url = self.card_list_url()?;
        url.query_pairs_mut().append_pair(&self.series_param, official_id);
        Ok(url.to_string())
    }
}

impl Default for OfficialSiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.onepiece-cardgame.com".to_string(),
            card_list_path: "cardlist/".to_string(),
            series_param: "series".to_string(),
            selectors: ListingSelectors::default(),
        }
    }
}

pub struct OfficialSiteSource {
    http: Arc<HttpClient>,
    parser: ListingParser,
    config: OfficialSiteConfig,
    cancel: CancellationToken,
}

impl OfficialSiteSource {
    pub fn new(
        http: Arc<HttpClient>,
        config: OfficialSiteConfig,
        language: Language,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let list_url = config.card_list_url()?;
        let parser = ListingParser::new(&config.selectors, list_url.as_str(), language)
            .context("Failed to build listing parser")?;
        Ok(Self {
            http,
            parser,
            config,
            cancel,
        })
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        Ok(self.http.get_text(url, &self.cancel).await?)
    }

    async fn fetch_series_page(&self, official_id: &str) -> Result<String> {
        let url = self.config.series_url(official_id)?;
        tracing::info!("Fetching series page {}", url);
        self.fetch(&url).await
    }
}

#[async_trait]
impl CardSource for OfficialSiteSource {
    fn language(&self) -> Language {
        self.parser.language()
    }

    async fn series_list(&self) -> Result<Vec<SeriesDraft>> {
        let url = self.config.card_list_url()?;
        let html = self.fetch(url.as_str()).await?;
        let series = self.parser.parse_series_list(&html)?;
        tracing::info!("Found {} series on {}", series.len(), url);
        Ok(series)
    }

    async fn series_cards(&self, official_id: &str) -> Result<Vec<CardDraft>> {
        let html = self.fetch_series_page(official_id).await?;
        Ok(self.parser.parse_cards(&html))
    }

    async fn illustration_types(&self, official_id: &str) -> Result<HashMap<String, String>> {
        let html = self.fetch_series_page(official_id).await?;
        Ok(self.parser.parse_illustration_types(&html))
    }

    async fn reported_count(&self, official_id: &str) -> Result<Option<i64>> {
        let html = self.fetch_series_page(official_id).await?;
        Ok(self.parser.parse_hit_count(&html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_url_carries_the_official_id() {
        let config = OfficialSiteConfig::for_language(Language::En);
        assert_eq!(
            config.series_url("569101").expect("url"),
            "https://en.onepiece-cardgame.com/cardlist/?series=569101"
        );
    }

    #[test]
    fn trailing_slash_on_base_is_tolerated() {
        let config = OfficialSiteConfig {
            base_url: "https://www.onepiece-cardgame.com/".to_string(),
            ..OfficialSiteConfig::default()
        };
        assert_eq!(
            config.card_list_url().expect("url").as_str(),
            "https://www.onepiece-cardgame.com/cardlist/"
        );
    }

    #[test]
    fn unparsable_base_url_is_a_final_fetch_error() {
        let config = OfficialSiteConfig {
            base_url: "not a url".to_string(),
            ..OfficialSiteConfig::default()
        };
        let err = config.series_url("550101").expect_err("invalid base");
        assert!(matches!(&err, FetchError::InvalidUrl { url, .. } if url == "not a url"));
        assert!(!err.is_retryable());
    }
}

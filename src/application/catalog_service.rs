//! Read views over the catalog

use anyhow::Result;
use serde::Serialize;

use crate::domain::card::Card;
use crate::domain::errors::CatalogError;
use crate::domain::language::Language;
use crate::domain::query::{CardFilter, CardVersions, LanguageStats, Page, SeriesGroup, VersionListing};
use crate::domain::series::{Series, SeriesType};
use crate::infrastructure::catalog_repository::CatalogRepository;

/// One series page: the series itself and a page of its versions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPage {
    pub series: Series,
    pub listings: Page<VersionListing>,
}

pub struct CatalogService {
    catalog: CatalogRepository,
    per_page: i64,
}

impl CatalogService {
    pub fn new(catalog: CatalogRepository, per_page: i64) -> Self {
        Self {
            catalog,
            per_page: per_page.max(1),
        }
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
    }

    /// Series of a language grouped by type, groups in display order and
    /// empty groups left out
    pub async fn series_groups(&self, language: Language) -> Result<Vec<SeriesGroup>> {
        let all = self.catalog.list_series(language).await?;
        Ok(group_series(all))
    }

    /// Versions printed in the series `code` whose cards are in `language`
    pub async fn series_view(
        &self,
        code: &str,
        language: Language,
        filter: &CardFilter,
        page: i64,
    ) -> Result<SeriesPage> {
        let series = self
            .catalog
            .find_series(code, language)
            .await?
            .ok_or_else(|| CatalogError::SeriesNotFound {
                code: code.to_string(),
                language: language.to_string(),
            })?;
        let listings = self
            .catalog
            .series_view(series.id, language, filter, page, self.per_page)
            .await?;
        Ok(SeriesPage { series, listings })
    }

    pub async fn card_list(&self, language: Language, filter: &CardFilter, page: i64) -> Result<Page<Card>> {
        self.catalog.card_list(language, filter, page, self.per_page).await
    }

    pub async fn card_versions(&self, card_number: &str, language: Language) -> Result<CardVersions> {
        self.catalog.card_versions(card_number, language).await
    }

    pub async fn stats(&self) -> Result<Vec<LanguageStats>> {
        self.catalog.language_stats().await
    }
}

fn group_series(all: Vec<Series>) -> Vec<SeriesGroup> {
    SeriesType::DISPLAY_ORDER
        .into_iter()
        .filter_map(|series_type| {
            let series: Vec<Series> = all.iter().filter(|s| s.series_type == series_type).cloned().collect();
            (!series.is_empty()).then_some(SeriesGroup { series_type, series })
        })
        .collect()
}

//! Back-filling version details from a fresh look at the listings

use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::pause;
use crate::domain::errors::CatalogError;
use crate::domain::reconciliation::{assign_version_indices, official_modal_id};
use crate::domain::series::Series;
use crate::infrastructure::catalog_repository::CatalogRepository;
use crate::infrastructure::sources::CardSource;

/// Label counted for versions the listing gave no illustration type for
pub const UNKNOWN_ILLUSTRATION: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeriesEnrichment {
    pub series_code: String,
    pub versions: usize,
    pub updated: usize,
    /// Illustration type → number of versions in the series. Empty for
    /// source-info runs.
    pub distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    pub series: Vec<SeriesEnrichment>,
    /// Stored series the source no longer lists
    pub skipped: Vec<String>,
}

impl EnrichmentReport {
    pub fn total_updated(&self) -> usize {
        self.series.iter().map(|s| s.updated).sum()
    }
}

pub struct EnrichmentService {
    catalog: CatalogRepository,
    cancel: CancellationToken,
    series_delay: Duration,
}

impl EnrichmentService {
    pub fn new(catalog: CatalogRepository, cancel: CancellationToken, series_delay: Duration) -> Self {
        Self {
            catalog,
            cancel,
            series_delay,
        }
    }

    /// Rewrite `source_description` of stored versions from the listing,
    /// matching on `(card_number, version index)`.
    pub async fn update_source_info(&self, source: &dyn CardSource, code: Option<&str>) -> Result<EnrichmentReport> {
        let targets = self.targets(source, code).await?;
        let mut report = EnrichmentReport::default();

        for (i, (series, official_id)) in targets.iter().enumerate() {
            let Some(official_id) = official_id else {
                warn!("Series {} is not listed by the source, skipping", series.code);
                report.skipped.push(series.code.clone());
                continue;
            };

            let mut cards = source.series_cards(official_id).await?;
            assign_version_indices(&mut cards);
            let by_key: HashMap<(String, u32), String> = cards
                .into_iter()
                .filter_map(|c| {
                    let info = c.source_info.filter(|s| !s.is_empty())?;
                    Some(((c.card_number, c.version_index), info))
                })
                .collect();

            let versions = self.catalog.versions_in_series(series.id).await?;
            let mut tx = self.catalog.begin().await?;
            let mut updated = 0;
            for entry in &versions {
                let key = (entry.card_number.clone(), entry.version.version_index());
                if let Some(info) = by_key.get(&key) {
                    if tx.update_version_source(entry.version.id, info).await? {
                        updated += 1;
                    }
                }
            }
            tx.commit().await?;

            info!("{}: updated source info on {} of {} versions", series.code, updated, versions.len());
            report.series.push(SeriesEnrichment {
                series_code: series.code.clone(),
                versions: versions.len(),
                updated,
                distribution: BTreeMap::new(),
            });

            if i + 1 < targets.len() && !pause(self.series_delay, &self.cancel).await {
                break;
            }
        }

        info!("Source info: {} versions updated", report.total_updated());
        Ok(report)
    }

    /// Write `illustration_type` on stored versions. Types are looked up by
    /// the listing's modal id first, then by the bare card number.
    pub async fn update_illustration_types(
        &self,
        source: &dyn CardSource,
        code: Option<&str>,
    ) -> Result<EnrichmentReport> {
        let targets = self.targets(source, code).await?;
        let mut report = EnrichmentReport::default();

        for (i, (series, official_id)) in targets.iter().enumerate() {
            let Some(official_id) = official_id else {
                warn!("Series {} is not listed by the source, skipping", series.code);
                report.skipped.push(series.code.clone());
                continue;
            };

            let kinds = source.illustration_types(official_id).await?;
            if kinds.is_empty() {
                warn!("{}: listing carries no illustration types", series.code);
            }

            let versions = self.catalog.versions_in_series(series.id).await?;
            let mut tx = self.catalog.begin().await?;
            let mut updated = 0;
            let mut distribution: BTreeMap<String, usize> = BTreeMap::new();
            for entry in &versions {
                let modal_id = official_modal_id(&entry.card_number, &entry.version.version_suffix);
                let kind = kinds.get(&modal_id).or_else(|| kinds.get(&entry.card_number));
                match kind {
                    Some(kind) => {
                        if tx.update_version_illustration(entry.version.id, kind).await? {
                            updated += 1;
                        }
                        *distribution.entry(kind.clone()).or_default() += 1;
                    }
                    None => {
                        let label = entry
                            .version
                            .illustration_type
                            .clone()
                            .unwrap_or_else(|| UNKNOWN_ILLUSTRATION.to_string());
                        *distribution.entry(label).or_default() += 1;
                    }
                }
            }
            tx.commit().await?;

            info!(
                "{}: updated illustration type on {} of {} versions {:?}",
                series.code,
                updated,
                versions.len(),
                distribution
            );
            report.series.push(SeriesEnrichment {
                series_code: series.code.clone(),
                versions: versions.len(),
                updated,
                distribution,
            });

            if i + 1 < targets.len() && !pause(self.series_delay, &self.cancel).await {
                break;
            }
        }

        info!("Illustration types: {} versions updated", report.total_updated());
        Ok(report)
    }

    /// Stored series of the source's language, each with the id the source
    /// currently lists it under (falling back to the stored id).
    async fn targets(&self, source: &dyn CardSource, code: Option<&str>) -> Result<Vec<(Series, Option<String>)>> {
        let language = source.language();
        let stored: Vec<Series> = self
            .catalog
            .list_series(language)
            .await?
            .into_iter()
            .filter(|s| code.is_none_or(|c| s.code == c))
            .collect();

        if let (Some(code), true) = (code, stored.is_empty()) {
            return Err(CatalogError::SeriesNotFound {
                code: code.to_string(),
                language: language.to_string(),
            }
            .into());
        }

        let live: HashMap<String, String> = source
            .series_list()
            .await?
            .into_iter()
            .filter_map(|s| Some((s.code, s.official_series_id?)))
            .collect();

        Ok(stored
            .into_iter()
            .map(|series| {
                let official = live
                    .get(&series.code)
                    .cloned()
                    .or_else(|| series.official_series_id.clone());
                (series, official)
            })
            .collect())
    }
}

//! Series import and reconciliation
//!
//! A listing is reconciled into the catalog one series at a time, inside a
//! single transaction: the series is upserted, every card is found or
//! created by `(card_number, language)`, linked to the series and given the
//! version its position in the listing calls for.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::pause;
use crate::domain::card::CardDraft;
use crate::domain::errors::CatalogError;
use crate::domain::language::Language;
use crate::domain::reconciliation::{assign_version_indices, is_reprint, version_suffix, version_type_for};
use crate::domain::series::SeriesDraft;
use crate::infrastructure::catalog_repository::{CatalogRepository, CatalogTransaction, ClearReport};
use crate::infrastructure::config::ImportConfig;
use crate::infrastructure::import_run_repository::{ImportRunRepository, RunStatus, RunTotals};
use crate::infrastructure::sources::CardSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Pause between series
    pub series_delay: Duration,
    /// Skip series that already hold versions
    pub skip_populated: bool,
    /// Overwrite text fields of cards that already exist
    pub refresh_card_text: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from(&ImportConfig::default())
    }
}

impl From<&ImportConfig> for ImportOptions {
    fn from(config: &ImportConfig) -> Self {
        Self {
            series_delay: Duration::from_millis(config.series_delay_ms),
            skip_populated: config.skip_populated,
            refresh_card_text: config.refresh_card_text,
        }
    }
}

/// What reconciling one series listing changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeriesImportReport {
    pub series_id: i64,
    pub series_code: String,
    pub entries: usize,
    pub cards_created: usize,
    pub links_created: usize,
    pub reprints_linked: usize,
    pub versions_created: usize,
    pub images_added: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesFailure {
    pub code: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRunReport {
    pub run_id: Uuid,
    pub language: Language,
    pub status: RunStatus,
    pub series_total: usize,
    pub imported: Vec<SeriesImportReport>,
    pub skipped: Vec<String>,
    pub failures: Vec<SeriesFailure>,
}

impl ImportRunReport {
    pub fn cards_created(&self) -> usize {
        self.imported.iter().map(|r| r.cards_created).sum()
    }

    pub fn versions_created(&self) -> usize {
        self.imported.iter().map(|r| r.versions_created).sum()
    }

    fn totals(&self) -> RunTotals {
        RunTotals {
            series_total: self.series_total as i64,
            series_done: self.imported.len() as i64,
            series_failed: self.failures.len() as i64,
            cards_created: self.cards_created() as i64,
            versions_created: self.versions_created() as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RescrapeReport {
    pub cleared: ClearSummary,
    pub import: ImportRunReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearSummary {
    pub cards: i64,
    pub versions: i64,
    pub links: i64,
    pub images: i64,
    pub prices: i64,
}

impl From<ClearReport> for ClearSummary {
    fn from(report: ClearReport) -> Self {
        Self {
            cards: report.cards,
            versions: report.versions,
            links: report.links,
            images: report.images,
            prices: report.prices,
        }
    }
}

pub struct ImportService {
    catalog: CatalogRepository,
    runs: ImportRunRepository,
    cancel: CancellationToken,
}

impl ImportService {
    pub fn new(catalog: CatalogRepository, runs: ImportRunRepository, cancel: CancellationToken) -> Self {
        Self { catalog, runs, cancel }
    }

    /// Reconcile one series listing in a single transaction
    pub async fn reconcile_series(
        &self,
        draft: &SeriesDraft,
        cards: Vec<CardDraft>,
        language: Language,
        refresh_card_text: bool,
    ) -> Result<SeriesImportReport> {
        let mut tx = self.catalog.begin().await?;
        // an early return drops `tx`, which rolls it back
        let report = reconcile_in(&mut tx, draft, cards, language, refresh_card_text).await?;
        tx.commit().await?;

        info!(
            "{} {}: {} entries, {} new cards, {} new versions, {} reprints linked",
            language,
            report.series_code,
            report.entries,
            report.cards_created,
            report.versions_created,
            report.reprints_linked
        );
        Ok(report)
    }

    /// Import every series the source lists
    pub async fn import_all(&self, source: &dyn CardSource, options: &ImportOptions) -> Result<ImportRunReport> {
        self.run_import(source, options, None, "all").await
    }

    /// Import only the listed series codes, in source order
    pub async fn import_codes(
        &self,
        source: &dyn CardSource,
        codes: &HashSet<String>,
        options: &ImportOptions,
    ) -> Result<ImportRunReport> {
        self.run_import(source, options, Some(codes), "selected").await
    }

    /// Import a single series by code
    pub async fn import_one(
        &self,
        source: &dyn CardSource,
        code: &str,
        options: &ImportOptions,
    ) -> Result<SeriesImportReport> {
        let language = source.language();
        let draft = source
            .series_list()
            .await?
            .into_iter()
            .find(|s| s.code == code)
            .ok_or_else(|| CatalogError::SeriesNotFound {
                code: code.to_string(),
                language: language.to_string(),
            })?;

        let run_id = self.runs.start(language, "one").await?;
        let result = self.import_series(source, &draft, options).await;
        let (status, totals) = match &result {
            Ok(report) => (
                RunStatus::Completed,
                RunTotals {
                    series_total: 1,
                    series_done: 1,
                    series_failed: 0,
                    cards_created: report.cards_created as i64,
                    versions_created: report.versions_created as i64,
                },
            ),
            Err(_) => (
                RunStatus::Failed,
                RunTotals {
                    series_total: 1,
                    series_failed: 1,
                    ..RunTotals::default()
                },
            ),
        };
        self.runs.finish(run_id, status, totals).await?;
        result
    }

    /// Drop every card of the source's language, then import everything again
    pub async fn full_rescrape(&self, source: &dyn CardSource, options: &ImportOptions) -> Result<RescrapeReport> {
        let language = source.language();
        let mut tx = self.catalog.begin().await?;
        let cleared = tx.clear_language(language).await?;
        tx.commit().await?;
        warn!(
            "Cleared {} data: {} cards, {} versions, {} images, {} prices",
            language, cleared.cards, cleared.versions, cleared.images, cleared.prices
        );

        let options = ImportOptions {
            skip_populated: false,
            ..options.clone()
        };
        let import = self.run_import(source, &options, None, "rescrape").await?;
        Ok(RescrapeReport {
            cleared: cleared.into(),
            import,
        })
    }

    async fn import_series(
        &self,
        source: &dyn CardSource,
        draft: &SeriesDraft,
        options: &ImportOptions,
    ) -> Result<SeriesImportReport> {
        let official_id = draft
            .official_series_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Series {} has no official id", draft.code))?;
        let cards = source.series_cards(official_id).await?;
        self.reconcile_series(draft, cards, source.language(), options.refresh_card_text)
            .await
    }

    async fn run_import(
        &self,
        source: &dyn CardSource,
        options: &ImportOptions,
        only: Option<&HashSet<String>>,
        mode: &str,
    ) -> Result<ImportRunReport> {
        let language = source.language();
        let run_id = self.runs.start(language, mode).await?;
        let mut report = ImportRunReport {
            run_id,
            language,
            status: RunStatus::Running,
            series_total: 0,
            imported: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
        };

        // the run row is closed on every path once it has been started
        let outcome = self.import_targets(source, options, only, &mut report).await;
        let failure = match outcome {
            Ok(()) => {
                if report.status == RunStatus::Running {
                    report.status = RunStatus::Completed;
                }
                None
            }
            Err(_) if self.cancel.is_cancelled() => {
                report.status = RunStatus::Cancelled;
                None
            }
            Err(e) => {
                report.status = RunStatus::Failed;
                Some(e)
            }
        };

        if let Err(e) = self.runs.finish(run_id, report.status, report.totals()).await {
            if let Some(failure) = failure {
                error!("Could not close import run {}: {:#}", run_id, e);
                return Err(failure);
            }
            return Err(e);
        }
        if let Some(failure) = failure {
            error!("Import run {} failed: {:#}", run_id, failure);
            return Err(failure);
        }

        info!(
            "Import run {} {}: {} imported, {} skipped, {} failed, {} new cards, {} new versions",
            run_id,
            report.status,
            report.imported.len(),
            report.skipped.len(),
            report.failures.len(),
            report.cards_created(),
            report.versions_created()
        );
        Ok(report)
    }

    /// Imports the selected series into `report`; errors here end the whole run
    async fn import_targets(
        &self,
        source: &dyn CardSource,
        options: &ImportOptions,
        only: Option<&HashSet<String>>,
        report: &mut ImportRunReport,
    ) -> Result<()> {
        let language = report.language;
        let series_list = source
            .series_list()
            .await
            .context("Failed to fetch series list")?;
        let targets: Vec<SeriesDraft> = series_list
            .into_iter()
            .filter(|s| only.is_none_or(|codes| codes.contains(&s.code)))
            .collect();
        report.series_total = targets.len();
        info!("Import run {} ({}): {} series", report.run_id, language, targets.len());

        for (i, draft) in targets.iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.status = RunStatus::Cancelled;
                break;
            }

            if options.skip_populated && self.is_populated(&draft.code, language).await? {
                info!("[{}/{}] {} already imported, skipping", i + 1, targets.len(), draft.code);
                report.skipped.push(draft.code.clone());
                continue;
            }

            info!("[{}/{}] Importing {} ({})", i + 1, targets.len(), draft.code, draft.name);
            match self.import_series(source, draft, options).await {
                Ok(series_report) => report.imported.push(series_report),
                Err(_) if self.cancel.is_cancelled() => {
                    report.status = RunStatus::Cancelled;
                    break;
                }
                Err(e) => {
                    warn!("Series {} failed: {:#}", draft.code, e);
                    report.failures.push(SeriesFailure {
                        code: draft.code.clone(),
                        error: format!("{e:#}"),
                    });
                }
            }

            if i + 1 < targets.len() && !pause(options.series_delay, &self.cancel).await {
                report.status = RunStatus::Cancelled;
                break;
            }
        }
        Ok(())
    }

    async fn is_populated(&self, code: &str, language: Language) -> Result<bool> {
        match self.catalog.find_series(code, language).await? {
            Some(series) => Ok(self.catalog.series_version_count(series.id).await? > 0),
            None => Ok(false),
        }
    }
}

async fn reconcile_in(
    tx: &mut CatalogTransaction,
    draft: &SeriesDraft,
    mut cards: Vec<CardDraft>,
    language: Language,
    refresh_card_text: bool,
) -> Result<SeriesImportReport> {
    let series = tx.upsert_series(draft, language).await?;
    assign_version_indices(&mut cards);

    let mut report = SeriesImportReport {
        series_id: series.id,
        series_code: series.code.clone(),
        entries: cards.len(),
        ..SeriesImportReport::default()
    };

    for card in &cards {
        let (stored, created) = tx
            .find_or_create_card(card, language, &series, refresh_card_text)
            .await?;
        if created {
            report.cards_created += 1;
        }

        let reprint = is_reprint(&card.card_number, &series.code);
        if tx
            .link_card_to_series(stored.id, series.id, reprint, card.source_info.as_deref())
            .await?
        {
            report.links_created += 1;
            if reprint {
                report.reprints_linked += 1;
            }
        }

        let (version, version_created) = tx
            .find_or_create_version(
                stored.id,
                series.id,
                &version_suffix(card.version_index),
                version_type_for(card.version_index),
                card.source_info.as_deref(),
            )
            .await?;
        if version_created {
            report.versions_created += 1;
        }

        if let Some(url) = card.image_url.as_deref().filter(|u| !u.is_empty()) {
            if tx.ensure_image(version.id, url).await? {
                report.images_added += 1;
            }
        }
    }

    Ok(report)
}

//! Data checks: stored counts against expected counts, overall status and
//! repair of cards filed under a series of the other language.

use anyhow::Result;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use crate::domain::constants::official_counts;
use crate::domain::language::Language;
use crate::domain::query::LanguageStats;
use crate::domain::series::SeriesDraft;
use crate::infrastructure::catalog_repository::CatalogRepository;
use crate::infrastructure::import_run_repository::{ImportRun, ImportRunRepository};
use crate::infrastructure::sources::CardSource;

const RECENT_RUNS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CountStatus {
    Match,
    Short,
    Over,
    /// The series is not in the catalog at all
    Missing,
}

impl CountStatus {
    pub fn classify(stored: Option<i64>, expected: i64) -> Self {
        match stored {
            None => Self::Missing,
            Some(n) if n == expected => Self::Match,
            Some(n) if n < expected => Self::Short,
            Some(_) => Self::Over,
        }
    }
}

impl fmt::Display for CountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Match => "match",
            Self::Short => "short",
            Self::Over => "over",
            Self::Missing => "missing",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountCheck {
    pub code: String,
    pub expected: i64,
    /// Versions stored for the series; 0 when the series is missing
    pub stored: i64,
    pub status: CountStatus,
}

impl CountCheck {
    pub fn diff(&self) -> i64 {
        self.stored - self.expected
    }
}

/// A series whose import looks incomplete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RescrapeTarget {
    pub code: String,
    pub official_series_id: Option<String>,
    pub expected: i64,
    pub stored_cards: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub languages: Vec<LanguageStats>,
    /// Versions without any image, per language
    pub missing_images: Vec<(Language, i64)>,
    pub recent_runs: Vec<ImportRun>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub cards_moved: usize,
    pub versions_moved: u64,
    /// Versions folded into an identical print already in the target series
    pub versions_merged: u64,
    /// Duplicate versions left in the wrong series because user data references them
    pub versions_left: u64,
    /// Codes of series created to receive moved cards
    pub series_created: Vec<String>,
}

pub struct VerificationService {
    catalog: CatalogRepository,
    runs: ImportRunRepository,
}

impl VerificationService {
    pub fn new(catalog: CatalogRepository, runs: ImportRunRepository) -> Self {
        Self { catalog, runs }
    }

    /// Compare expected per-series counts with the versions stored per series
    pub async fn verify_counts(&self, language: Language, expected: &[(String, i64)]) -> Result<Vec<CountCheck>> {
        let mut checks = Vec::with_capacity(expected.len());
        for (code, expected) in expected {
            let stored = match self.catalog.find_series(code, language).await? {
                Some(series) => Some(self.catalog.series_version_count(series.id).await?),
                None => None,
            };
            let check = CountCheck {
                code: code.clone(),
                expected: *expected,
                stored: stored.unwrap_or(0),
                status: CountStatus::classify(stored, *expected),
            };
            if check.status != CountStatus::Match {
                warn!("{} {}: expected {}, stored {} ({})", language, code, expected, check.stored, check.status);
            }
            checks.push(check);
        }
        checks.sort_by(|a, b| a.code.cmp(&b.code));

        let mismatches = checks.iter().filter(|c| c.status != CountStatus::Match).count();
        info!("Verified {} series ({}), {} mismatches", checks.len(), language, mismatches);
        Ok(checks)
    }

    /// Ask the source for the count it shows per series and compare with the
    /// stored versions. Series the source reports no count for are left out.
    pub async fn verify_reported_counts(&self, source: &dyn CardSource) -> Result<Vec<CountCheck>> {
        let mut expected = Vec::new();
        for draft in source.series_list().await? {
            let Some(official_id) = draft.official_series_id.as_deref() else {
                continue;
            };
            match source.reported_count(official_id).await {
                Ok(Some(count)) => expected.push((draft.code.clone(), count)),
                Ok(None) => warn!("{}: source shows no count", draft.code),
                Err(e) => warn!("{}: count lookup failed: {:#}", draft.code, e),
            }
        }
        self.verify_counts(source.language(), &expected).await
    }

    /// Checks against the built-in table for the source's language, or
    /// against the counts the source reports when there is no table or
    /// `prefer_source` is set
    pub async fn check_counts(&self, source: &dyn CardSource, prefer_source: bool) -> Result<Vec<CountCheck>> {
        match official_counts::for_language(source.language()) {
            Some(table) if !prefer_source => self.verify_counts(source.language(), &table).await,
            _ => {
                info!("Using counts reported by the {} card list", source.language());
                self.verify_reported_counts(source).await
            }
        }
    }

    /// Series that are missing or hold fewer than `threshold × expected`
    /// primary cards
    pub async fn series_needing_rescrape(
        &self,
        language: Language,
        expected: &[(String, i64)],
        threshold: f64,
    ) -> Result<Vec<RescrapeTarget>> {
        let mut targets = Vec::new();
        for (code, expected) in expected {
            let target = match self.catalog.find_series(code, language).await? {
                None => Some(RescrapeTarget {
                    code: code.clone(),
                    official_series_id: None,
                    expected: *expected,
                    stored_cards: 0,
                }),
                Some(series) => {
                    let stored = self.catalog.series_card_count(series.id).await?;
                    ((stored as f64) < (*expected as f64) * threshold).then(|| RescrapeTarget {
                        code: code.clone(),
                        official_series_id: series.official_series_id.clone(),
                        expected: *expected,
                        stored_cards: stored,
                    })
                }
            };
            targets.extend(target);
        }
        info!("{} series need a rescrape ({})", targets.len(), language);
        Ok(targets)
    }

    pub async fn status(&self) -> Result<StatusReport> {
        let languages = self.catalog.language_stats().await?;
        let mut missing_images = Vec::with_capacity(Language::ALL.len());
        for language in Language::ALL {
            missing_images.push((language, self.catalog.versions_without_images(language).await?));
        }
        let recent_runs = self.runs.recent(RECENT_RUNS).await?;
        Ok(StatusReport {
            languages,
            missing_images,
            recent_runs,
        })
    }

    /// Move cards whose primary series has another language onto the
    /// same-code series of their own language, creating it when needed.
    /// Versions the card has in the wrong series move along.
    pub async fn repair_misfiled(&self) -> Result<RepairReport> {
        let misfiled = self.catalog.misfiled_cards().await?;
        let mut report = RepairReport::default();
        if misfiled.is_empty() {
            info!("No misfiled cards");
            return Ok(report);
        }

        let mut tx = self.catalog.begin().await?;
        for (card, wrong) in &misfiled {
            let target = match tx.find_series(&wrong.code, card.language).await? {
                Some(series) => series,
                None => {
                    let draft = SeriesDraft {
                        code: wrong.code.clone(),
                        name: bracketed_name(&wrong.name),
                        series_type: wrong.series_type,
                        official_series_id: wrong.official_series_id.clone(),
                        release_date: wrong.release_date,
                    };
                    let created = tx.upsert_series(&draft, card.language).await?;
                    info!("Created {} series {} (id {})", card.language, created.code, created.id);
                    report.series_created.push(created.code.clone());
                    created
                }
            };

            tx.relocate_card(card.id, target.id).await?;
            let prints = tx.move_card_prints(card.id, wrong.id, target.id).await?;
            report.versions_moved += prints.moved;
            report.versions_merged += prints.merged;
            report.versions_left += prints.left_behind;
            report.cards_moved += 1;
        }
        tx.commit().await?;

        info!(
            "Moved {} cards ({} versions moved, {} merged, {} left behind), created {} series",
            report.cards_moved,
            report.versions_moved,
            report.versions_merged,
            report.versions_left,
            report.series_created.len()
        );
        Ok(report)
    }
}

/// `ブースターパック【OP-01】` style names read `ブースターパック [OP-01]`
fn bracketed_name(name: &str) -> String {
    name.replace('【', " [").replace('】', "]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, 17, CountStatus::Missing)]
    #[case(Some(17), 17, CountStatus::Match)]
    #[case(Some(15), 17, CountStatus::Short)]
    #[case(Some(20), 17, CountStatus::Over)]
    fn classifies_counts(#[case] stored: Option<i64>, #[case] expected: i64, #[case] status: CountStatus) {
        assert_eq!(CountStatus::classify(stored, expected), status);
    }

    #[test]
    fn converts_full_width_brackets() {
        assert_eq!(bracketed_name("ROMANCE DAWN【OP-01】"), "ROMANCE DAWN [OP-01]");
    }
}

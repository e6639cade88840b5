//! Repository for the card catalog (series, cards, versions, images)
//!
//! Reads go straight to the pool. Writes happen inside a
//! [`CatalogTransaction`] so a series import either lands completely or
//! not at all.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::card::{Card, CardDraft, CardImage, CardSeriesLink, CardVersion, VersionType};
use crate::domain::constants::import::FRONT_IMAGE;
use crate::domain::errors::CatalogError;
use crate::domain::language::Language;
use crate::domain::query::{
    page_offset, CardFilter, CardVersions, LanguageStats, Page, SeriesVersions, VersionListing,
    VersionWithImages,
};
use crate::domain::series::{Series, SeriesDraft};
use crate::infrastructure::rows::{
    bind_all, bind_all_scalar, card_from_row, image_from_row, placeholders, series_from_row,
    version_from_row, where_clause, SqlArg, CARD_COLUMNS, IMAGE_COLUMNS, SERIES_COLUMNS,
    VERSION_COLUMNS,
};

/// Version order inside one series: base print first, then `_v1`, `_v2`, ... `_v10`
const SUFFIX_ORDER: &str = "LENGTH(v.version_suffix), v.version_suffix";

/// A version plus the number of the card it prints
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRef {
    pub version: CardVersion,
    pub card_number: String,
}

/// Outcome of moving a card's prints between series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrintMove {
    pub moved: u64,
    /// Duplicates folded into the version already in the target series
    pub merged: u64,
    /// Duplicates kept in place because user data points at them
    pub left_behind: u64,
}

/// What a language clear removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub cards: i64,
    pub versions: i64,
    pub links: i64,
    pub images: i64,
    pub prices: i64,
}

#[derive(Clone)]
pub struct CatalogRepository {
    pool: Arc<SqlitePool>,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a write transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> Result<CatalogTransaction> {
        let tx = self.pool.begin().await.context("Failed to begin transaction")?;
        Ok(CatalogTransaction { tx })
    }

    // ===============================
    // SERIES
    // ===============================

    pub async fn find_series(&self, code: &str, language: Language) -> Result<Option<Series>> {
        let sql = format!("SELECT {} FROM series s WHERE s.code = ? AND s.language = ?", SERIES_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(code)
            .bind(language.as_str())
            .fetch_optional(&*self.pool)
            .await?;
        row.as_ref().map(series_from_row).transpose()
    }

    /// Series of one language, newest code first
    pub async fn list_series(&self, language: Language) -> Result<Vec<Series>> {
        let sql = format!(
            "SELECT {} FROM series s WHERE s.language = ? ORDER BY s.code DESC",
            SERIES_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(language.as_str())
            .fetch_all(&*self.pool)
            .await?;
        rows.iter().map(series_from_row).collect()
    }

    // ===============================
    // CARDS & VERSIONS
    // ===============================

    pub async fn find_card(&self, card_number: &str, language: Language) -> Result<Option<Card>> {
        let sql = format!(
            "SELECT {} FROM cards c WHERE c.card_number = ? AND c.language = ?",
            CARD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(card_number)
            .bind(language.as_str())
            .fetch_optional(&*self.pool)
            .await?;
        row.as_ref().map(card_from_row).transpose()
    }

    /// Cards of one language ordered by number, optionally restricted to
    /// cards whose primary series has the given code.
    pub async fn cards_for_language(
        &self,
        language: Language,
        series_code: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<Card>> {
        let mut conditions = vec!["c.language = ?".to_string()];
        let mut args: Vec<SqlArg> = vec![language.as_str().into()];
        if let Some(code) = series_code {
            conditions.push("s.code = ?".to_string());
            args.push(code.into());
        }
        let limit_clause = match limit {
            Some(n) => {
                args.push(n.into());
                "LIMIT ?"
            }
            None => "",
        };

        let sql = format!(
            "SELECT {} FROM cards c JOIN series s ON s.id = c.series_id {} ORDER BY c.card_number {}",
            CARD_COLUMNS,
            where_clause(&conditions),
            limit_clause
        );
        let rows = bind_all(sqlx::query(&sql), &args).fetch_all(&*self.pool).await?;
        rows.iter().map(card_from_row).collect()
    }

    /// Every version of a card in creation order
    pub async fn versions_for_card(&self, card_id: i64) -> Result<Vec<CardVersion>> {
        let sql = format!("SELECT {} FROM card_versions v WHERE v.card_id = ? ORDER BY v.id", VERSION_COLUMNS);
        let rows = sqlx::query(&sql).bind(card_id).fetch_all(&*self.pool).await?;
        rows.iter().map(version_from_row).collect()
    }

    /// Versions printed in a series, with their card numbers
    pub async fn versions_in_series(&self, series_id: i64) -> Result<Vec<VersionRef>> {
        let sql = format!(
            "SELECT {}, c.card_number AS card_number FROM card_versions v \
             JOIN cards c ON c.id = v.card_id \
             WHERE v.series_id = ? ORDER BY c.card_number, {}",
            VERSION_COLUMNS, SUFFIX_ORDER
        );
        let rows = sqlx::query(&sql).bind(series_id).fetch_all(&*self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(VersionRef {
                    version: version_from_row(row)?,
                    card_number: row.try_get("card_number")?,
                })
            })
            .collect()
    }

    pub async fn links_for_card(&self, card_id: i64) -> Result<Vec<CardSeriesLink>> {
        let rows = sqlx::query(
            "SELECT card_id, series_id, is_reprint, source_info, created_at \
             FROM card_series WHERE card_id = ? ORDER BY series_id",
        )
        .bind(card_id)
        .fetch_all(&*self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CardSeriesLink {
                    card_id: row.try_get("card_id")?,
                    series_id: row.try_get("series_id")?,
                    is_reprint: row.try_get("is_reprint")?,
                    source_info: row.try_get("source_info")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    pub async fn images_for_versions(&self, version_ids: &[i64]) -> Result<HashMap<i64, Vec<CardImage>>> {
        let mut images: HashMap<i64, Vec<CardImage>> = HashMap::new();
        if version_ids.is_empty() {
            return Ok(images);
        }

        let sql = format!(
            "SELECT {} FROM card_images i WHERE i.version_id IN ({}) ORDER BY i.id",
            IMAGE_COLUMNS,
            placeholders(version_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in version_ids {
            query = query.bind(*id);
        }
        for row in query.fetch_all(&*self.pool).await? {
            let image = image_from_row(&row)?;
            images.entry(image.version_id).or_default().push(image);
        }
        Ok(images)
    }

    // ===============================
    // VIEWS
    // ===============================

    /// "All cards in this series": versions printed in the series whose card
    /// is in `language`, filtered and paginated.
    pub async fn series_view(
        &self,
        series_id: i64,
        language: Language,
        filter: &CardFilter,
        page: i64,
        per_page: i64,
    ) -> Result<Page<VersionListing>> {
        let mut conditions = vec!["v.series_id = ?".to_string(), "c.language = ?".to_string()];
        let mut args: Vec<SqlArg> = vec![series_id.into(), language.as_str().into()];
        push_card_filters(filter, &mut conditions, &mut args);
        push_version_filters(filter, &mut conditions, &mut args);
        let where_sql = where_clause(&conditions);

        let count_sql = format!(
            "SELECT COUNT(*) FROM card_versions v JOIN cards c ON c.id = v.card_id {}",
            where_sql
        );
        let total: i64 = bind_all_scalar(sqlx::query_scalar(&count_sql), &args)
            .fetch_one(&*self.pool)
            .await?;

        let data_sql = format!(
            "SELECT {}, {}, \
             (SELECT original_url FROM card_images ci WHERE ci.version_id = v.id ORDER BY ci.id LIMIT 1) AS image_url \
             FROM card_versions v JOIN cards c ON c.id = v.card_id {} \
             ORDER BY c.card_number, {} LIMIT ? OFFSET ?",
            VERSION_COLUMNS, CARD_COLUMNS, where_sql, SUFFIX_ORDER
        );
        let rows = bind_all(sqlx::query(&data_sql), &args)
            .bind(per_page)
            .bind(page_offset(page, per_page))
            .fetch_all(&*self.pool)
            .await?;

        let items = rows
            .iter()
            .map(|row| {
                Ok(VersionListing {
                    version: version_from_row(row)?,
                    card: card_from_row(row)?,
                    image_url: row.try_get("image_url")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, total, page.max(1), per_page))
    }

    /// Card list without a series: one row per card. Version-level filters
    /// join versions and deduplicate.
    pub async fn card_list(
        &self,
        language: Language,
        filter: &CardFilter,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Card>> {
        let mut conditions = vec!["c.language = ?".to_string()];
        let mut args: Vec<SqlArg> = vec![language.as_str().into()];
        push_card_filters(filter, &mut conditions, &mut args);

        let join = if filter.touches_versions() {
            push_version_filters(filter, &mut conditions, &mut args);
            "JOIN card_versions v ON v.card_id = c.id"
        } else {
            ""
        };
        let where_sql = where_clause(&conditions);

        let count_sql = format!("SELECT COUNT(DISTINCT c.id) FROM cards c {} {}", join, where_sql);
        let total: i64 = bind_all_scalar(sqlx::query_scalar(&count_sql), &args)
            .fetch_one(&*self.pool)
            .await?;

        let data_sql = format!(
            "SELECT DISTINCT {} FROM cards c {} {} ORDER BY c.card_number LIMIT ? OFFSET ?",
            CARD_COLUMNS, join, where_sql
        );
        let rows = bind_all(sqlx::query(&data_sql), &args)
            .bind(per_page)
            .bind(page_offset(page, per_page))
            .fetch_all(&*self.pool)
            .await?;
        let items = rows.iter().map(card_from_row).collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, total, page.max(1), per_page))
    }

    /// "All versions of this card" across series of the card's language,
    /// grouped by series (newest code first).
    pub async fn card_versions(&self, card_number: &str, language: Language) -> Result<CardVersions> {
        let card = self
            .find_card(card_number, language)
            .await?
            .ok_or_else(|| CatalogError::CardNotFound {
                card_number: card_number.to_string(),
                language: language.to_string(),
            })?;

        let sql = format!(
            "SELECT {}, {} FROM card_versions v JOIN series s ON s.id = v.series_id \
             WHERE v.card_id = ? AND s.language = ? \
             ORDER BY s.code DESC, {}",
            VERSION_COLUMNS, SERIES_COLUMNS, SUFFIX_ORDER
        );
        let rows = sqlx::query(&sql)
            .bind(card.id)
            .bind(language.as_str())
            .fetch_all(&*self.pool)
            .await?;

        let mut listed: Vec<(Series, CardVersion)> = Vec::with_capacity(rows.len());
        for row in &rows {
            listed.push((series_from_row(row)?, version_from_row(row)?));
        }

        let version_ids: Vec<i64> = listed.iter().map(|(_, v)| v.id).collect();
        let mut images = self.images_for_versions(&version_ids).await?;

        let mut groups: Vec<SeriesVersions> = Vec::new();
        for (series, version) in listed {
            let entry = VersionWithImages {
                images: images.remove(&version.id).unwrap_or_default(),
                version,
            };
            match groups.last_mut() {
                Some(group) if group.series.id == series.id => group.versions.push(entry),
                _ => groups.push(SeriesVersions {
                    series,
                    versions: vec![entry],
                }),
            }
        }

        Ok(CardVersions { card, series: groups })
    }

    // ===============================
    // STATISTICS
    // ===============================

    pub async fn language_stats(&self) -> Result<Vec<LanguageStats>> {
        let mut stats = Vec::with_capacity(Language::ALL.len());
        for language in Language::ALL {
            let lang = language.as_str();
            let series: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM series WHERE language = ?")
                .bind(lang)
                .fetch_one(&*self.pool)
                .await?;
            let cards: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE language = ?")
                .bind(lang)
                .fetch_one(&*self.pool)
                .await?;
            let versions: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM card_versions v JOIN cards c ON c.id = v.card_id WHERE c.language = ?",
            )
            .bind(lang)
            .fetch_one(&*self.pool)
            .await?;
            let images: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM card_images i \
                 JOIN card_versions v ON v.id = i.version_id \
                 JOIN cards c ON c.id = v.card_id WHERE c.language = ?",
            )
            .bind(lang)
            .fetch_one(&*self.pool)
            .await?;

            stats.push(LanguageStats {
                language,
                series,
                cards,
                versions,
                images,
            });
        }
        Ok(stats)
    }

    /// Versions printed in the series
    pub async fn series_version_count(&self, series_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM card_versions WHERE series_id = ?")
            .bind(series_id)
            .fetch_one(&*self.pool)
            .await?;
        Ok(count)
    }

    /// Cards whose primary series is this one
    pub async fn series_card_count(&self, series_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE series_id = ?")
            .bind(series_id)
            .fetch_one(&*self.pool)
            .await?;
        Ok(count)
    }

    pub async fn versions_without_images(&self, language: Language) -> Result<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM card_versions v JOIN cards c ON c.id = v.card_id \
             WHERE c.language = ? AND NOT EXISTS (SELECT 1 FROM card_images i WHERE i.version_id = v.id)",
        )
        .bind(language.as_str())
        .fetch_one(&*self.pool)
        .await?;
        Ok(count)
    }

    /// Cards whose primary series belongs to another language
    pub async fn misfiled_cards(&self) -> Result<Vec<(Card, Series)>> {
        let sql = format!(
            "SELECT {}, {} FROM cards c JOIN series s ON s.id = c.series_id \
             WHERE s.language != c.language ORDER BY c.language, c.card_number",
            CARD_COLUMNS, SERIES_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&*self.pool).await?;
        rows.iter()
            .map(|row| Ok((card_from_row(row)?, series_from_row(row)?)))
            .collect()
    }
}

fn push_card_filters(filter: &CardFilter, conditions: &mut Vec<String>, args: &mut Vec<SqlArg>) {
    if let Some(card_type) = filter.card_type() {
        conditions.push("c.card_type = ?".to_string());
        args.push(card_type.into());
    }
    if let Some(color) = filter.color() {
        conditions.push("c.colors LIKE ?".to_string());
        args.push(format!("%{}%", color).into());
    }
    let rarities = filter.rarity_values();
    if !rarities.is_empty() {
        conditions.push(format!("c.rarity IN ({})", placeholders(rarities.len())));
        args.extend(rarities.into_iter().map(SqlArg::from));
    }
}

fn push_version_filters(filter: &CardFilter, conditions: &mut Vec<String>, args: &mut Vec<SqlArg>) {
    if let Some(kind) = filter.illustration_type() {
        conditions.push("v.illustration_type = ?".to_string());
        args.push(kind.into());
    }
    if let Some(star) = filter.star_mark {
        conditions.push("v.has_star_mark = ?".to_string());
        args.push(i64::from(star).into());
    }
}

/// Write side of the catalog, bound to one transaction
pub struct CatalogTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl CatalogTransaction {
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("Failed to commit transaction")
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.context("Failed to roll back transaction")
    }

    pub async fn find_series(&mut self, code: &str, language: Language) -> Result<Option<Series>> {
        let sql = format!("SELECT {} FROM series s WHERE s.code = ? AND s.language = ?", SERIES_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(code)
            .bind(language.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(series_from_row).transpose()
    }

    /// Insert the series, or refresh name/type/official id of the existing
    /// `(code, language)` row.
    pub async fn upsert_series(&mut self, draft: &SeriesDraft, language: Language) -> Result<Series> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO series (code, language, name, series_type, official_series_id, release_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (code, language) DO UPDATE SET
                name = excluded.name,
                series_type = excluded.series_type,
                official_series_id = COALESCE(excluded.official_series_id, series.official_series_id),
                release_date = COALESCE(excluded.release_date, series.release_date),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&draft.code)
        .bind(language.as_str())
        .bind(&draft.name)
        .bind(draft.series_type.as_str())
        .bind(&draft.official_series_id)
        .bind(draft.release_date)
        .bind(now)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("Failed to upsert series {}", draft.code))?;

        self.find_series(&draft.code, language)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Series {} vanished after upsert", draft.code))
    }

    pub async fn find_card(&mut self, card_number: &str, language: Language) -> Result<Option<Card>> {
        let sql = format!(
            "SELECT {} FROM cards c WHERE c.card_number = ? AND c.language = ?",
            CARD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(card_number)
            .bind(language.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(card_from_row).transpose()
    }

    /// Find the card by `(card_number, language)` or create it with `series`
    /// as its primary series. An existing card is returned untouched unless
    /// `refresh_text` is set, in which case its name and text fields are
    /// overwritten with non-empty values from the draft.
    ///
    /// Returns the card and whether it was created.
    pub async fn find_or_create_card(
        &mut self,
        draft: &CardDraft,
        language: Language,
        series: &Series,
        refresh_text: bool,
    ) -> Result<(Card, bool)> {
        if let Some(card) = self.find_card(&draft.card_number, language).await? {
            if refresh_text {
                self.refresh_card_text(card.id, draft).await?;
                let refreshed = self
                    .find_card(&draft.card_number, language)
                    .await?
                    .unwrap_or(card);
                return Ok((refreshed, false));
            }
            return Ok((card, false));
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO cards
            (card_number, language, series_id, name, card_type, rarity, colors, cost, life, power,
             counter, attribute, traits, effect_text, trigger_text, source_info, block_icon,
             created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.card_number)
        .bind(language.as_str())
        .bind(series.id)
        .bind(&draft.name)
        .bind(&draft.card_type)
        .bind(&draft.rarity)
        .bind(&draft.colors)
        .bind(draft.cost)
        .bind(draft.life)
        .bind(draft.power)
        .bind(draft.counter)
        .bind(&draft.attribute)
        .bind(&draft.traits)
        .bind(&draft.effect_text)
        .bind(&draft.trigger_text)
        .bind(&draft.source_info)
        .bind(draft.block_icon)
        .bind(now)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("Failed to insert card {}", draft.card_number))?;

        let card = self
            .find_card(&draft.card_number, language)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Card {} vanished after insert", draft.card_number))?;
        Ok((card, true))
    }

    async fn refresh_card_text(&mut self, card_id: i64, draft: &CardDraft) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE cards SET
                name = CASE WHEN ? != '' THEN ? ELSE name END,
                effect_text = COALESCE(?, effect_text),
                trigger_text = COALESCE(?, trigger_text),
                traits = COALESCE(?, traits),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.name)
        .bind(non_blank(draft.effect_text.as_deref()))
        .bind(non_blank(draft.trigger_text.as_deref()))
        .bind(non_blank(draft.traits.as_deref()))
        .bind(Utc::now())
        .bind(card_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    /// Record that the card appears in the series. Returns whether a new
    /// link was created; an existing link is left as is.
    pub async fn link_card_to_series(
        &mut self,
        card_id: i64,
        series_id: i64,
        is_reprint: bool,
        source_info: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO card_series (card_id, series_id, is_reprint, source_info, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(card_id)
        .bind(series_id)
        .bind(is_reprint)
        .bind(source_info)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn find_version(&mut self, card_id: i64, series_id: i64, suffix: &str) -> Result<Option<CardVersion>> {
        let sql = format!(
            "SELECT {} FROM card_versions v WHERE v.card_id = ? AND v.series_id = ? AND v.version_suffix = ?",
            VERSION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(card_id)
            .bind(series_id)
            .bind(suffix)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(version_from_row).transpose()
    }

    /// Find the `(card, series, suffix)` version or create it.
    /// Returns the version and whether it was created.
    pub async fn find_or_create_version(
        &mut self,
        card_id: i64,
        series_id: i64,
        suffix: &str,
        version_type: VersionType,
        source_description: Option<&str>,
    ) -> Result<(CardVersion, bool)> {
        if let Some(version) = self.find_version(card_id, series_id, suffix).await? {
            return Ok((version, false));
        }

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO card_versions \
             (card_id, series_id, version_type, version_suffix, has_star_mark, source_description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 0, ?, ?, ?)",
        )
        .bind(card_id)
        .bind(series_id)
        .bind(version_type.as_str())
        .bind(suffix)
        .bind(source_description)
        .bind(now)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;

        let version = self
            .find_version(card_id, series_id, suffix)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Version {}/{}{} vanished after insert", card_id, series_id, suffix))?;
        Ok((version, true))
    }

    /// Attach a front image URL unless the version already has an image.
    pub async fn ensure_image(&mut self, version_id: i64, original_url: &str) -> Result<bool> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM card_images WHERE version_id = ?")
            .bind(version_id)
            .fetch_one(&mut *self.tx)
            .await?;
        if existing > 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO card_images (version_id, image_type, original_url, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(version_id)
        .bind(FRONT_IMAGE)
        .bind(original_url)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await?;
        Ok(true)
    }

    /// Returns whether the stored value changed
    pub async fn update_version_source(&mut self, version_id: i64, source: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE card_versions SET source_description = ?, updated_at = ? \
             WHERE id = ? AND source_description IS NOT ?",
        )
        .bind(source)
        .bind(Utc::now())
        .bind(version_id)
        .bind(source)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns whether the stored value changed
    pub async fn update_version_illustration(&mut self, version_id: i64, kind: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE card_versions SET illustration_type = ?, updated_at = ? \
             WHERE id = ? AND illustration_type IS NOT ?",
        )
        .bind(kind)
        .bind(Utc::now())
        .bind(version_id)
        .bind(kind)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Point a card's primary series somewhere else
    pub async fn relocate_card(&mut self, card_id: i64, series_id: i64) -> Result<()> {
        sqlx::query("UPDATE cards SET series_id = ?, updated_at = ? WHERE id = ?")
            .bind(series_id)
            .bind(Utc::now())
            .bind(card_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    /// Move every version and link of a card from one series to another.
    ///
    /// A version whose (card, suffix) already exists in the target is merged
    /// into that row: its images and prices move over and the duplicate is
    /// deleted. Duplicates still referenced by user data stay where they are.
    pub async fn move_card_prints(&mut self, card_id: i64, from_series: i64, to_series: i64) -> Result<PrintMove> {
        let mut outcome = PrintMove {
            moved: sqlx::query(
                "UPDATE OR IGNORE card_versions SET series_id = ?, updated_at = ? WHERE card_id = ? AND series_id = ?",
            )
            .bind(to_series)
            .bind(Utc::now())
            .bind(card_id)
            .bind(from_series)
            .execute(&mut *self.tx)
            .await?
            .rows_affected(),
            ..PrintMove::default()
        };

        let duplicates: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT s.id, t.id FROM card_versions s \
             JOIN card_versions t ON t.card_id = s.card_id AND t.series_id = ? AND t.version_suffix = s.version_suffix \
             WHERE s.card_id = ? AND s.series_id = ?",
        )
        .bind(to_series)
        .bind(card_id)
        .bind(from_series)
        .fetch_all(&mut *self.tx)
        .await?;

        for (stray, kept) in duplicates {
            if self.version_references(stray).await? > 0 {
                tracing::warn!("Version {} is referenced by user data, leaving it in series {}", stray, from_series);
                outcome.left_behind += 1;
                continue;
            }
            self.merge_version(stray, kept).await?;
            outcome.merged += 1;
        }

        sqlx::query("UPDATE OR IGNORE card_series SET series_id = ? WHERE card_id = ? AND series_id = ?")
            .bind(to_series)
            .bind(card_id)
            .bind(from_series)
            .execute(&mut *self.tx)
            .await?;
        if outcome.left_behind == 0 {
            sqlx::query("DELETE FROM card_series WHERE card_id = ? AND series_id = ?")
                .bind(card_id)
                .bind(from_series)
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(outcome)
    }

    async fn version_references(&mut self, version_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar(
            r#"
            SELECT
                (SELECT COUNT(*) FROM user_collections WHERE version_id = ?1)
              + (SELECT COUNT(*) FROM wishlists WHERE version_id = ?1)
              + (SELECT COUNT(*) FROM deck_cards WHERE version_id = ?1)
              + (SELECT COUNT(*) FROM decks WHERE leader_version_id = ?1)
            "#,
        )
        .bind(version_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    /// Fold `stray` into `kept`, then delete it
    async fn merge_version(&mut self, stray: i64, kept: i64) -> Result<()> {
        sqlx::query(
            "UPDATE card_images SET version_id = ?1 WHERE version_id = ?2 AND NOT EXISTS \
             (SELECT 1 FROM card_images k WHERE k.version_id = ?1 AND k.original_url IS card_images.original_url)",
        )
        .bind(kept)
        .bind(stray)
        .execute(&mut *self.tx)
        .await?;

        // one price per source and day, the kept version's row wins
        sqlx::query(
            "UPDATE price_history SET version_id = ?1 WHERE version_id = ?2 AND NOT EXISTS \
             (SELECT 1 FROM price_history k WHERE k.version_id = ?1 AND k.source = price_history.source \
              AND substr(k.recorded_at, 1, 10) = substr(price_history.recorded_at, 1, 10))",
        )
        .bind(kept)
        .bind(stray)
        .execute(&mut *self.tx)
        .await?;

        sqlx::query("DELETE FROM card_versions WHERE id = ?")
            .bind(stray)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    /// Remove every card of a language with its versions, links, images
    /// and prices. Series rows are kept.
    ///
    /// Fails with [`CatalogError::LanguageInUse`] while collections,
    /// wishlists or decks reference any of those versions.
    pub async fn clear_language(&mut self, language: Language) -> Result<ClearReport> {
        let lang = language.as_str();
        let references: i64 = sqlx::query_scalar(
            r#"
            SELECT
                (SELECT COUNT(*) FROM user_collections x JOIN card_versions v ON v.id = x.version_id
                    JOIN cards c ON c.id = v.card_id WHERE c.language = ?1)
              + (SELECT COUNT(*) FROM wishlists x JOIN card_versions v ON v.id = x.version_id
                    JOIN cards c ON c.id = v.card_id WHERE c.language = ?1)
              + (SELECT COUNT(*) FROM deck_cards x JOIN card_versions v ON v.id = x.version_id
                    JOIN cards c ON c.id = v.card_id WHERE c.language = ?1)
            "#,
        )
        .bind(lang)
        .fetch_one(&mut *self.tx)
        .await?;
        if references > 0 {
            return Err(CatalogError::LanguageInUse {
                language: lang.to_string(),
                references,
            }
            .into());
        }

        let report = ClearReport {
            cards: self.count_for_language("SELECT COUNT(*) FROM cards c WHERE c.language = ?", lang).await?,
            versions: self
                .count_for_language(
                    "SELECT COUNT(*) FROM card_versions v JOIN cards c ON c.id = v.card_id WHERE c.language = ?",
                    lang,
                )
                .await?,
            links: self
                .count_for_language(
                    "SELECT COUNT(*) FROM card_series l JOIN cards c ON c.id = l.card_id WHERE c.language = ?",
                    lang,
                )
                .await?,
            images: self
                .count_for_language(
                    "SELECT COUNT(*) FROM card_images i JOIN card_versions v ON v.id = i.version_id \
                     JOIN cards c ON c.id = v.card_id WHERE c.language = ?",
                    lang,
                )
                .await?,
            prices: self
                .count_for_language(
                    "SELECT COUNT(*) FROM price_history p JOIN card_versions v ON v.id = p.version_id \
                     JOIN cards c ON c.id = v.card_id WHERE c.language = ?",
                    lang,
                )
                .await?,
        };

        // Versions, links, images and prices cascade from cards.
        sqlx::query("DELETE FROM cards WHERE language = ?")
            .bind(lang)
            .execute(&mut *self.tx)
            .await?;

        Ok(report)
    }

    async fn count_for_language(&mut self, sql: &str, lang: &str) -> Result<i64> {
        let count = sqlx::query_scalar(sql).bind(lang).fetch_one(&mut *self.tx).await?;
        Ok(count)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

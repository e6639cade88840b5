//! Row mapping shared by the repositories
//!
//! Every catalog query selects through the column lists below, which alias
//! each column with a table prefix (`s_`, `c_`, `v_`, `i_`). Joined queries
//! can then map several entities out of one row.

use anyhow::Result;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite};

use crate::domain::card::{Card, CardImage, CardVersion, VersionType};
use crate::domain::language::Language;
use crate::domain::series::{Series, SeriesType};

pub const SERIES_COLUMNS: &str = "s.id AS s_id, s.code AS s_code, s.language AS s_language, \
    s.name AS s_name, s.series_type AS s_series_type, s.official_series_id AS s_official_series_id, \
    s.release_date AS s_release_date, s.card_count AS s_card_count, s.cover_image AS s_cover_image, \
    s.created_at AS s_created_at, s.updated_at AS s_updated_at";

pub const CARD_COLUMNS: &str = "c.id AS c_id, c.card_number AS c_card_number, c.language AS c_language, \
    c.series_id AS c_series_id, c.name AS c_name, c.card_type AS c_card_type, c.rarity AS c_rarity, \
    c.colors AS c_colors, c.cost AS c_cost, c.life AS c_life, c.power AS c_power, c.counter AS c_counter, \
    c.attribute AS c_attribute, c.traits AS c_traits, c.effect_text AS c_effect_text, \
    c.trigger_text AS c_trigger_text, c.source_info AS c_source_info, c.block_icon AS c_block_icon, \
    c.created_at AS c_created_at, c.updated_at AS c_updated_at";

pub const VERSION_COLUMNS: &str = "v.id AS v_id, v.card_id AS v_card_id, v.series_id AS v_series_id, \
    v.version_type AS v_version_type, v.version_suffix AS v_version_suffix, \
    v.has_star_mark AS v_has_star_mark, v.rarity_variant AS v_rarity_variant, \
    v.source_description AS v_source_description, v.illustration_type AS v_illustration_type, \
    v.created_at AS v_created_at, v.updated_at AS v_updated_at";

pub const IMAGE_COLUMNS: &str = "i.id AS i_id, i.version_id AS i_version_id, i.image_type AS i_image_type, \
    i.local_path AS i_local_path, i.original_url AS i_original_url, i.width AS i_width, \
    i.height AS i_height, i.created_at AS i_created_at";

pub fn series_from_row(row: &SqliteRow) -> Result<Series> {
    Ok(Series {
        id: row.try_get("s_id")?,
        code: row.try_get("s_code")?,
        language: row.try_get::<String, _>("s_language")?.parse::<Language>()?,
        name: row.try_get("s_name")?,
        series_type: SeriesType::from_db(&row.try_get::<String, _>("s_series_type")?),
        official_series_id: row.try_get("s_official_series_id")?,
        release_date: row.try_get("s_release_date")?,
        card_count: row.try_get("s_card_count")?,
        cover_image: row.try_get("s_cover_image")?,
        created_at: row.try_get("s_created_at")?,
        updated_at: row.try_get("s_updated_at")?,
    })
}

pub fn card_from_row(row: &SqliteRow) -> Result<Card> {
    Ok(Card {
        id: row.try_get("c_id")?,
        card_number: row.try_get("c_card_number")?,
        language: row.try_get::<String, _>("c_language")?.parse::<Language>()?,
        series_id: row.try_get("c_series_id")?,
        name: row.try_get("c_name")?,
        card_type: row.try_get("c_card_type")?,
        rarity: row.try_get("c_rarity")?,
        colors: row.try_get("c_colors")?,
        cost: row.try_get("c_cost")?,
        life: row.try_get("c_life")?,
        power: row.try_get("c_power")?,
        counter: row.try_get("c_counter")?,
        attribute: row.try_get("c_attribute")?,
        traits: row.try_get("c_traits")?,
        effect_text: row.try_get("c_effect_text")?,
        trigger_text: row.try_get("c_trigger_text")?,
        source_info: row.try_get("c_source_info")?,
        block_icon: row.try_get("c_block_icon")?,
        created_at: row.try_get("c_created_at")?,
        updated_at: row.try_get("c_updated_at")?,
    })
}

pub fn version_from_row(row: &SqliteRow) -> Result<CardVersion> {
    Ok(CardVersion {
        id: row.try_get("v_id")?,
        card_id: row.try_get("v_card_id")?,
        series_id: row.try_get("v_series_id")?,
        version_type: VersionType::from_db(&row.try_get::<String, _>("v_version_type")?),
        version_suffix: row.try_get("v_version_suffix")?,
        has_star_mark: row.try_get("v_has_star_mark")?,
        rarity_variant: row.try_get("v_rarity_variant")?,
        source_description: row.try_get("v_source_description")?,
        illustration_type: row.try_get("v_illustration_type")?,
        created_at: row.try_get("v_created_at")?,
        updated_at: row.try_get("v_updated_at")?,
    })
}

pub fn image_from_row(row: &SqliteRow) -> Result<CardImage> {
    Ok(CardImage {
        id: row.try_get("i_id")?,
        version_id: row.try_get("i_version_id")?,
        image_type: row.try_get("i_image_type")?,
        local_path: row.try_get("i_local_path")?,
        original_url: row.try_get("i_original_url")?,
        width: row.try_get("i_width")?,
        height: row.try_get("i_height")?,
        created_at: row.try_get("i_created_at")?,
    })
}

/// Value bound into a dynamically built WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Int(i64),
    Text(String),
}

impl From<i64> for SqlArg {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<String> for SqlArg {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SqlArg {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

pub type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;
pub type SqliteScalar<'q, T> = sqlx::query::QueryScalar<'q, Sqlite, T, SqliteArguments<'q>>;

pub fn bind_all<'q>(mut query: SqliteQuery<'q>, args: &'q [SqlArg]) -> SqliteQuery<'q> {
    for arg in args {
        query = match arg {
            SqlArg::Int(v) => query.bind(*v),
            SqlArg::Text(v) => query.bind(v.as_str()),
        };
    }
    query
}

pub fn bind_all_scalar<'q, T>(mut query: SqliteScalar<'q, T>, args: &'q [SqlArg]) -> SqliteScalar<'q, T> {
    for arg in args {
        query = match arg {
            SqlArg::Int(v) => query.bind(*v),
            SqlArg::Text(v) => query.bind(v.as_str()),
        };
    }
    query
}

/// `WHERE a AND b` or the empty string
pub fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

/// `?, ?, ?` for an IN list of `n` items
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

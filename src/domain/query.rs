//! Catalog query inputs and view shapes

use serde::{Deserialize, Serialize};

use crate::domain::card::{Card, CardImage, CardVersion};
use crate::domain::language::Language;
use crate::domain::series::{Series, SeriesType};

/// Rarity filter value that matches the special-card rarity in either language
pub const RARITY_SP: &str = "SP";
const RARITY_SP_STORED: [&str; 2] = ["SP CARD", "SPカード"];

/// Optional filters shared by the series view and the card list.
/// Empty strings are treated as "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardFilter {
    pub card_type: Option<String>,
    /// Matches when the card's color list contains this color
    pub color: Option<String>,
    pub rarity: Option<String>,
    pub illustration_type: Option<String>,
    pub star_mark: Option<bool>,
}

impl CardFilter {
    pub fn card_type(&self) -> Option<&str> {
        non_empty(self.card_type.as_deref())
    }

    pub fn color(&self) -> Option<&str> {
        non_empty(self.color.as_deref())
    }

    pub fn illustration_type(&self) -> Option<&str> {
        non_empty(self.illustration_type.as_deref())
    }

    /// Stored rarity values the rarity filter matches
    pub fn rarity_values(&self) -> Vec<String> {
        match non_empty(self.rarity.as_deref()) {
            None => Vec::new(),
            Some(RARITY_SP) => RARITY_SP_STORED.iter().map(ToString::to_string).collect(),
            Some(r) => vec![r.to_string()],
        }
    }

    /// Whether the filter needs version columns (and so a join on versions)
    pub fn touches_versions(&self) -> bool {
        self.illustration_type().is_some() || self.star_mark.is_some()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            total.max(0) / per_page + i64::from(total.max(0) % per_page != 0)
        } else {
            0
        };
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// Zero-based row offset for a 1-based page number
pub fn page_offset(page: i64, per_page: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(per_page.max(0))
}

/// A version together with its card and first image, as listed in a series view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionListing {
    pub version: CardVersion,
    pub card: Card,
    pub image_url: Option<String>,
}

/// A version with every image it has
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionWithImages {
    pub version: CardVersion,
    pub images: Vec<CardImage>,
}

/// All versions of a card that appeared in one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesVersions {
    pub series: Series,
    pub versions: Vec<VersionWithImages>,
}

/// The "all versions of this card" view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardVersions {
    pub card: Card,
    /// Ordered by series code descending
    pub series: Vec<SeriesVersions>,
}

impl CardVersions {
    pub fn version_count(&self) -> usize {
        self.series.iter().map(|s| s.versions.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesGroup {
    pub series_type: SeriesType,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStats {
    pub language: Language,
    pub series: i64,
    pub cards: i64,
    pub versions: i64,
    pub images: i64,
}

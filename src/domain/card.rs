//! Card, card version and image entities
//!
//! A `Card` is the canonical playable unit, identified by
//! `(card_number, language)`. Every physical print of it lives in
//! `CardVersion`, scoped to the series it was printed in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::language::Language;

/// Card type string used for leaders
pub const LEADER: &str = "LEADER";

/// Canonical card identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub card_number: String,
    pub language: Language,
    /// Series the card was first imported from
    pub series_id: i64,
    pub name: String,
    pub card_type: String,
    pub rarity: String,
    /// Comma separated colors, e.g. `"赤,緑"`
    pub colors: String,
    pub cost: Option<i32>,
    pub life: Option<i32>,
    pub power: Option<i32>,
    pub counter: Option<i32>,
    pub attribute: Option<String>,
    /// Slash separated traits, e.g. `"麦わらの一味/超新星"`
    pub traits: Option<String>,
    pub effect_text: Option<String>,
    pub trigger_text: Option<String>,
    pub source_info: Option<String>,
    pub block_icon: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn color_list(&self) -> Vec<&str> {
        split_list(&self.colors, ',')
    }

    pub fn trait_list(&self) -> Vec<&str> {
        self.traits
            .as_deref()
            .map(|t| split_list(t, '/'))
            .unwrap_or_default()
    }

    pub fn is_leader(&self) -> bool {
        self.card_type == LEADER
    }
}

/// English color names and the stored (Japanese) form
const COLOR_NAMES: [(&str, &str); 6] = [
    ("Red", "赤"),
    ("Green", "緑"),
    ("Blue", "青"),
    ("Purple", "紫"),
    ("Yellow", "黄"),
    ("Black", "黒"),
];

/// Normalize a color field so both languages filter on the same values.
///
/// `"Red/Green"` becomes `"赤,緑"`; Japanese input passes through with
/// separators unified to `,`.
pub fn normalize_colors(raw: &str) -> String {
    raw.split(['/', ',', ' '])
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| {
            COLOR_NAMES
                .iter()
                .find(|(en, _)| en.eq_ignore_ascii_case(c))
                .map_or(c, |(_, jp)| *jp)
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn split_list(value: &str, sep: char) -> Vec<&str> {
    value
        .split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Kind of print a version represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Normal,
    AltArt,
    Comic,
    Special,
    Promo,
}

impl VersionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::AltArt => "alt_art",
            Self::Comic => "comic",
            Self::Special => "special",
            Self::Promo => "promo",
        }
    }

    /// Label shown in catalog listings
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Normal => "普通版",
            Self::AltArt => "异画版",
            Self::Comic => "漫画版",
            Self::Special => "特别版",
            Self::Promo => "Promo",
        }
    }

    /// Lenient parse for stored values; unknown strings read as `Normal`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "alt_art" => Self::AltArt,
            "comic" => Self::Comic,
            "special" => Self::Special,
            "promo" => Self::Promo,
            _ => Self::Normal,
        }
    }
}

impl fmt::Display for VersionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One print of a card inside one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardVersion {
    pub id: i64,
    pub card_id: i64,
    pub series_id: i64,
    pub version_type: VersionType,
    /// `""` for the base print, `_v1`, `_v2`, ... for later prints in the same series
    pub version_suffix: String,
    pub has_star_mark: bool,
    pub rarity_variant: Option<String>,
    pub source_description: Option<String>,
    pub illustration_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CardVersion {
    pub fn version_index(&self) -> u32 {
        crate::domain::reconciliation::version_index(&self.version_suffix)
    }

    pub fn display_name(&self) -> &'static str {
        self.version_type.display_name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardImage {
    pub id: i64,
    pub version_id: i64,
    pub image_type: String,
    pub local_path: Option<String>,
    pub original_url: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Row of the card/series join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSeriesLink {
    pub card_id: i64,
    pub series_id: i64,
    pub is_reprint: bool,
    pub source_info: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A card as read off a series listing, before reconciliation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardDraft {
    pub card_number: String,
    pub name: String,
    pub card_type: String,
    pub rarity: String,
    pub colors: String,
    pub cost: Option<i32>,
    pub life: Option<i32>,
    pub power: Option<i32>,
    pub counter: Option<i32>,
    pub attribute: Option<String>,
    pub traits: Option<String>,
    pub effect_text: Option<String>,
    pub trigger_text: Option<String>,
    pub source_info: Option<String>,
    pub block_icon: Option<i32>,
    pub image_url: Option<String>,
    /// 0-based order of appearance of this card number within the listing
    pub version_index: u32,
}

impl CardDraft {
    pub fn new(card_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            card_number: card_number.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_card() -> Card {
        let now = Utc::now();
        Card {
            id: 1,
            card_number: "OP01-001".into(),
            language: Language::Jp,
            series_id: 1,
            name: "ロロノア・ゾロ".into(),
            card_type: LEADER.into(),
            rarity: "L".into(),
            colors: "赤, 緑".into(),
            cost: None,
            life: Some(5),
            power: Some(5000),
            counter: None,
            attribute: Some("斬".into()),
            traits: Some("超新星/麦わらの一味".into()),
            effect_text: None,
            trigger_text: None,
            source_info: None,
            block_icon: Some(1),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn color_and_trait_lists_split_on_their_separators() {
        let card = sample_card();
        assert_eq!(card.color_list(), vec!["赤", "緑"]);
        assert_eq!(card.trait_list(), vec!["超新星", "麦わらの一味"]);
        assert!(card.is_leader());
    }

    #[test]
    fn empty_lists_when_fields_missing() {
        let mut card = sample_card();
        card.colors = String::new();
        card.traits = None;
        assert!(card.color_list().is_empty());
        assert!(card.trait_list().is_empty());
    }

    #[test]
    fn english_colors_normalize_to_stored_form() {
        assert_eq!(normalize_colors("Red/Green"), "赤,緑");
        assert_eq!(normalize_colors("purple"), "紫");
        assert_eq!(normalize_colors("赤/緑"), "赤,緑");
        assert_eq!(normalize_colors(""), "");
    }

    #[test]
    fn version_type_round_trips_through_storage() {
        for t in [
            VersionType::Normal,
            VersionType::AltArt,
            VersionType::Comic,
            VersionType::Special,
            VersionType::Promo,
        ] {
            assert_eq!(VersionType::from_db(t.as_str()), t);
        }
        assert_eq!(VersionType::from_db("mystery"), VersionType::Normal);
        assert_eq!(VersionType::AltArt.display_name(), "异画版");
    }
}

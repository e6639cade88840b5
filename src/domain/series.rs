//! Series (product release) entities and listing-label classification

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::language::Language;

/// Product line a series belongs to. Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesType {
    Booster,
    Starter,
    Extra,
    Premium,
    Promo,
    Don,
    Limited,
    Ultimate,
    Family,
    Other,
}

impl SeriesType {
    pub const DISPLAY_ORDER: [SeriesType; 10] = [
        SeriesType::Booster,
        SeriesType::Starter,
        SeriesType::Extra,
        SeriesType::Premium,
        SeriesType::Promo,
        SeriesType::Don,
        SeriesType::Limited,
        SeriesType::Ultimate,
        SeriesType::Family,
        SeriesType::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Booster => "booster",
            Self::Starter => "starter",
            Self::Extra => "extra",
            Self::Premium => "premium",
            Self::Promo => "promo",
            Self::Don => "don",
            Self::Limited => "limited",
            Self::Ultimate => "ultimate",
            Self::Family => "family",
            Self::Other => "other",
        }
    }

    /// Lenient parse for stored values; unknown strings read as `Other`.
    pub fn from_db(value: &str) -> Self {
        Self::DISPLAY_ORDER
            .into_iter()
            .find(|t| t.as_str() == value)
            .unwrap_or(Self::Other)
    }
}

impl fmt::Display for SeriesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword → type tables, checked in order. Longer product names come first
/// so that e.g. "プレミアムブースター" is not classified as a plain booster.
const JP_TYPE_KEYWORDS: [(&str, SeriesType); 8] = [
    ("プレミアムブースター", SeriesType::Premium),
    ("エクストラブースター", SeriesType::Extra),
    ("ブースターパック", SeriesType::Booster),
    ("スタートデッキ", SeriesType::Starter),
    ("アルティメットデッキ", SeriesType::Ultimate),
    ("ファミリーデッキ", SeriesType::Family),
    ("プロモーションカード", SeriesType::Promo),
    ("限定商品", SeriesType::Limited),
];

const EN_TYPE_KEYWORDS: [(&str, SeriesType); 6] = [
    ("PREMIUM BOOSTER", SeriesType::Premium),
    ("EXTRA BOOSTER", SeriesType::Extra),
    ("BOOSTER PACK", SeriesType::Booster),
    ("STARTER DECK", SeriesType::Starter),
    ("ULTIMATE DECK", SeriesType::Ultimate),
    ("PROMOTION", SeriesType::Promo),
];

/// Placeholder options in the series selector ("all series" and headings)
const SKIPPED_LABELS: [&str; 4] = ["収録", "ALL", "Card Set", ""];

/// Code prefixes that legitimately contain a second `-` segment
const COMPOUND_CODE_PREFIXES: [&str; 4] = ["OP", "ST", "EB", "PRB"];

static JP_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"【([A-Z]+-?\d+)】").expect("static regex"));
static EN_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([A-Z]+-?\d+(?:-[A-Z]+\d+)?)\]").expect("static regex"));
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("static regex"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Classify a series label by the first keyword that appears in it.
pub fn classify_series_type(label: &str, language: Language) -> SeriesType {
    let table: &[(&str, SeriesType)] = match language {
        Language::Jp => &JP_TYPE_KEYWORDS,
        Language::En => &EN_TYPE_KEYWORDS,
    };
    table
        .iter()
        .find(|(keyword, _)| label.contains(keyword))
        .map_or(SeriesType::Other, |(_, t)| *t)
}

/// Extract the series code from a selector label.
///
/// Japanese labels carry `【OP-01】`, English labels `[OP-01]`. English
/// compound codes outside the known product lines keep only their first part.
pub fn parse_series_code(label: &str, language: Language) -> Option<String> {
    let re = match language {
        Language::Jp => &*JP_CODE,
        Language::En => &*EN_CODE,
    };
    let code = re.captures(label)?.get(1)?.as_str();

    if language == Language::En
        && code.contains('-')
        && !COMPOUND_CODE_PREFIXES.iter().any(|p| code.starts_with(p))
    {
        return code.split('-').next().map(str::to_string);
    }
    Some(code.to_string())
}

/// Strip markup and collapse whitespace in a selector label.
pub fn clean_label(raw: &str) -> String {
    let without_tags = TAGS.replace_all(raw, " ");
    SPACES.replace_all(without_tags.trim(), " ").trim().to_string()
}

/// Turn one `<option value=..>label</option>` of the series selector into a draft.
///
/// Returns `None` for placeholder options and labels without a code.
pub fn parse_series_option(value: &str, label: &str, language: Language) -> Option<SeriesDraft> {
    let raw = label.trim();
    if value.trim().is_empty() || SKIPPED_LABELS.contains(&raw) {
        return None;
    }

    let name = clean_label(raw);
    let code = parse_series_code(&name, language)?;
    Some(SeriesDraft {
        series_type: classify_series_type(&name, language),
        code,
        name,
        official_series_id: Some(value.trim().to_string()),
        release_date: None,
    })
}

/// Persisted series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: i64,
    pub code: String,
    pub language: Language,
    pub name: String,
    pub series_type: SeriesType,
    /// Identifier the official card list uses for this series
    pub official_series_id: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub card_count: Option<i32>,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Series {
    /// Series code without dashes, comparable to card number prefixes
    pub fn prefix(&self) -> String {
        crate::domain::reconciliation::series_prefix(&self.code)
    }
}

/// Series as discovered on a source, before reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDraft {
    pub code: String,
    pub name: String,
    pub series_type: SeriesType,
    pub official_series_id: Option<String>,
    pub release_date: Option<NaiveDate>,
}

impl SeriesDraft {
    pub fn new(code: impl Into<String>, name: impl Into<String>, series_type: SeriesType) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            series_type,
            official_series_id: None,
            release_date: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("プレミアムブースター ONE PIECE CARD THE BEST【PRB-01】", SeriesType::Premium)]
    #[case("エクストラブースター メモリアルコレクション【EB-01】", SeriesType::Extra)]
    #[case("ブースターパック ROMANCE DAWN【OP-01】", SeriesType::Booster)]
    #[case("スタートデッキ 麦わらの一味【ST-01】", SeriesType::Starter)]
    #[case("アルティメットデッキ 3兄弟の絆【ST-13】", SeriesType::Ultimate)]
    #[case("ファミリーデッキセット【ST-16】", SeriesType::Family)]
    #[case("プロモーションカード【P-001】", SeriesType::Promo)]
    #[case("限定商品収録カード", SeriesType::Limited)]
    fn classifies_japanese_labels(#[case] label: &str, #[case] expected: SeriesType) {
        assert_eq!(classify_series_type(label, Language::Jp), expected);
    }

    #[rstest]
    #[case("PREMIUM BOOSTER -ONE PIECE CARD THE BEST- [PRB-01]", SeriesType::Premium)]
    #[case("BOOSTER PACK -ROMANCE DAWN- [OP-01]", SeriesType::Booster)]
    #[case("STARTER DECK -Straw Hat Crew- [ST-01]", SeriesType::Starter)]
    #[case("Other Product Card", SeriesType::Other)]
    fn classifies_english_labels(#[case] label: &str, #[case] expected: SeriesType) {
        assert_eq!(classify_series_type(label, Language::En), expected);
    }

    #[rstest]
    #[case("ブースターパック ROMANCE DAWN【OP-01】", Language::Jp, Some("OP-01"))]
    #[case("プロモーションカード【P-001】", Language::Jp, Some("P-001"))]
    #[case("BOOSTER PACK [OP14-EB04]", Language::En, Some("OP14-EB04"))]
    #[case("PROMOTION CARDS [P-001]", Language::En, Some("P"))]
    #[case("Limited product [LP01-EB02]", Language::En, Some("LP01"))]
    #[case("限定商品収録カード", Language::Jp, None)]
    fn extracts_series_codes(
        #[case] label: &str,
        #[case] language: Language,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(parse_series_code(label, language).as_deref(), expected);
    }

    #[test]
    fn placeholder_options_are_skipped() {
        assert!(parse_series_option("", "ブースターパック【OP-01】", Language::Jp).is_none());
        assert!(parse_series_option("550101", "ALL", Language::Jp).is_none());
        assert!(parse_series_option("550101", "収録", Language::Jp).is_none());
        assert!(parse_series_option("550101", "Card Set", Language::En).is_none());
    }

    #[test]
    fn option_becomes_draft_with_clean_name() {
        let draft = parse_series_option(
            "550101",
            "ブースターパック <br class=\"spInline\">ROMANCE DAWN   【OP-01】",
            Language::Jp,
        )
        .unwrap();
        assert_eq!(draft.code, "OP-01");
        assert_eq!(draft.name, "ブースターパック ROMANCE DAWN 【OP-01】");
        assert_eq!(draft.series_type, SeriesType::Booster);
        assert_eq!(draft.official_series_id.as_deref(), Some("550101"));
    }

    #[test]
    fn stored_type_strings_parse_leniently() {
        assert_eq!(SeriesType::from_db("don"), SeriesType::Don);
        assert_eq!(SeriesType::from_db("weird"), SeriesType::Other);
    }
}

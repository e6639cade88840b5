//! Catalog domain constants
//!
//! Official per-series listing sizes and other fixed values of the card
//! game's product catalog.

/// Official listing sizes (every print, including parallels and reprints),
/// taken from the Japanese card list. English releases lag behind and
/// differ per series, so there is no table for them.
pub mod official_counts {
    use crate::domain::language::Language;

    /// Booster, extra booster and premium booster series
    pub const BOOSTERS: [(&str, i64); 20] = [
        ("OP-01", 121),
        ("OP-02", 121),
        ("OP-03", 122),
        ("OP-04", 121),
        ("OP-05", 120),
        ("OP-06", 129),
        ("OP-07", 142),
        ("OP-08", 142),
        ("OP-09", 137),
        ("OP-10", 144),
        ("OP-11", 144),
        ("OP-12", 144),
        ("OP-13", 144),
        ("OP-14", 156),
        ("EB-01", 88),
        ("EB-02", 173),
        ("EB-03", 124),
        ("EB-04", 96),
        ("PRB-01", 216),
        ("PRB-02", 347),
    ];

    /// Starter decks ST-01 through ST-29 ship 17 cards unless listed here
    pub const STARTER_EXCEPTIONS: [(&str, i64); 2] = [("ST-11", 15), ("ST-21", 26)];
    pub const STARTER_DEFAULT: i64 = 17;
    pub const LAST_STARTER: u32 = 29;

    /// Full table as `(series code, expected count)`, boosters first
    pub fn all() -> Vec<(String, i64)> {
        let mut counts: Vec<(String, i64)> = BOOSTERS
            .iter()
            .map(|(code, n)| ((*code).to_string(), *n))
            .collect();

        for i in 1..=LAST_STARTER {
            let code = format!("ST-{i:02}");
            let n = STARTER_EXCEPTIONS
                .iter()
                .find(|(c, _)| *c == code)
                .map_or(STARTER_DEFAULT, |(_, n)| *n);
            counts.push((code, n));
        }
        counts
    }

    /// The table for `language`, when one exists
    pub fn for_language(language: Language) -> Option<Vec<(String, i64)>> {
        match language {
            Language::Jp => Some(all()),
            Language::En => None,
        }
    }
}

/// Import and enrichment defaults
pub mod import {
    /// Share of the official count below which a series is rescraped
    pub const RESCRAPE_THRESHOLD: f64 = 0.9;

    /// Image type recorded for listing images
    pub const FRONT_IMAGE: &str = "front";
}

/// Price tracking defaults
pub mod prices {
    /// Source tag of the public price API
    pub const API_SOURCE: &str = "optcg_api";

    pub const DEFAULT_CONDITION: &str = "unsealed";
    pub const DEFAULT_PRICE_TYPE: &str = "average";
}

#[cfg(test)]
mod tests {
    use super::official_counts;

    #[test]
    fn official_table_covers_boosters_and_starters() {
        let all = official_counts::all();
        assert_eq!(all.len(), 20 + 29);

        let lookup = |code: &str| all.iter().find(|(c, _)| c == code).map(|(_, n)| *n);
        assert_eq!(lookup("OP-14"), Some(156));
        assert_eq!(lookup("ST-01"), Some(17));
        assert_eq!(lookup("ST-11"), Some(15));
        assert_eq!(lookup("ST-21"), Some(26));
        assert_eq!(lookup("ST-29"), Some(17));
        assert_eq!(lookup("ST-30"), None);
    }

    #[test]
    fn only_japanese_lists_have_a_table() {
        use crate::domain::language::Language;

        assert_eq!(official_counts::for_language(Language::Jp), Some(official_counts::all()));
        assert!(official_counts::for_language(Language::En).is_none());
    }
}

//! Card/series/version reconciliation rules
//!
//! Pure functions shared by the importer and the enrichment jobs. A card's
//! identity is `(card_number, language)` and never forks; each appearance
//! of a card number in a series listing maps onto one `CardVersion` keyed by
//! `(card, series, version_suffix)`.

use std::collections::HashMap;

use crate::domain::card::{CardDraft, VersionType};

/// Card number prefix: everything before the first `-` (`"OP01-001"` → `"OP01"`).
/// Numbers without a dash have an empty prefix.
pub fn card_prefix(card_number: &str) -> &str {
    card_number
        .split_once('-')
        .map_or("", |(prefix, _)| prefix)
}

/// Series code with dashes removed (`"OP-01"` → `"OP01"`).
pub fn series_prefix(series_code: &str) -> String {
    series_code.replace('-', "")
}

/// A card is a reprint in a series when its number prefix does not match
/// the series code.
pub fn is_reprint(card_number: &str, series_code: &str) -> bool {
    card_prefix(card_number) != series_prefix(series_code)
}

/// Suffix stored on a version for the n-th appearance within a series.
pub fn version_suffix(index: u32) -> String {
    if index == 0 {
        String::new()
    } else {
        format!("_v{index}")
    }
}

/// Inverse of [`version_suffix`]. Anything unparsable reads as the base print.
pub fn version_index(suffix: &str) -> u32 {
    suffix
        .strip_prefix("_v")
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// First appearance is the normal print, later ones are alternate art.
pub fn version_type_for(index: u32) -> VersionType {
    if index == 0 {
        VersionType::Normal
    } else {
        VersionType::AltArt
    }
}

/// Number repeated appearances of the same card number in listing order.
///
/// The first card of each number gets 0, the next 1, and so on.
pub fn assign_version_indices(cards: &mut [CardDraft]) {
    let mut seen: HashMap<String, u32> = HashMap::new();
    for card in cards.iter_mut() {
        let next = seen.entry(card.card_number.clone()).or_insert(0);
        card.version_index = *next;
        *next += 1;
    }
}

/// Identifier the official card list uses for a version's detail modal:
/// the card number for the base print, `OP01-001_p1` for `_v1` and so on.
pub fn official_modal_id(card_number: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        card_number.to_string()
    } else {
        format!("{card_number}{}", suffix.replace("_v", "_p"))
    }
}

/// Parse a numeric card stat. `-` and empty mean "no value"; any
/// non-digit characters are dropped (`"+1000"` → 1000).
pub fn parse_stat(text: &str) -> Option<i32> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return None;
    }
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("OP01-001", "OP-01", false)]
    #[case("ST01-012", "OP-01", true)]
    #[case("OP05-119", "PRB-01", true)]
    #[case("EB01-001", "EB-01", false)]
    #[case("P-001", "P-001", true)]
    #[case("NODASH", "OP-01", true)]
    fn reprint_detection(#[case] number: &str, #[case] code: &str, #[case] reprint: bool) {
        assert_eq!(is_reprint(number, code), reprint);
    }

    #[test]
    fn prefix_of_number_without_dash_is_empty() {
        assert_eq!(card_prefix("DON"), "");
        assert_eq!(card_prefix("OP01-001"), "OP01");
    }

    #[test]
    fn indices_follow_listing_order() {
        let mut cards = vec![
            CardDraft::new("OP01-001", "a"),
            CardDraft::new("OP01-002", "b"),
            CardDraft::new("OP01-001", "a"),
            CardDraft::new("OP01-001", "a"),
            CardDraft::new("OP01-002", "b"),
        ];
        assign_version_indices(&mut cards);
        let indices: Vec<u32> = cards.iter().map(|c| c.version_index).collect();
        assert_eq!(indices, vec![0, 0, 1, 2, 1]);
    }

    #[test]
    fn modal_ids_swap_v_for_p() {
        assert_eq!(official_modal_id("OP01-001", ""), "OP01-001");
        assert_eq!(official_modal_id("OP01-001", "_v2"), "OP01-001_p2");
    }

    #[test]
    fn unparsable_suffix_is_base_print() {
        assert_eq!(version_index(""), 0);
        assert_eq!(version_index("_alt"), 0);
        assert_eq!(version_index("_vx"), 0);
        assert_eq!(version_index("_v3"), 3);
    }

    #[rstest]
    #[case("5000", Some(5000))]
    #[case("+1000", Some(1000))]
    #[case("-", None)]
    #[case("  ", None)]
    #[case("なし", None)]
    fn stat_parsing(#[case] raw: &str, #[case] expected: Option<i32>) {
        assert_eq!(parse_stat(raw), expected);
    }

    proptest! {
        #[test]
        fn suffix_and_index_are_inverse(index in 0u32..10_000) {
            prop_assert_eq!(version_index(&version_suffix(index)), index);
        }

        #[test]
        fn only_base_print_is_normal(index in 0u32..10_000) {
            prop_assert_eq!(version_type_for(index) == VersionType::Normal, index == 0);
        }
    }
}

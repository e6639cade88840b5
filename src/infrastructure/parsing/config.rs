//! CSS selectors for the official card list pages
//!
//! Each field takes several selectors tried in order; the first one that
//! matches wins. Defaults follow the current markup of the card list site
//! and can be overridden per language in the config file.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    /// `<option>` elements of the series picker
    pub series_option: Vec<String>,
    /// One element per card print
    pub card_container: Vec<String>,
    /// Spans holding `[card number, rarity, card type]`
    pub info_spans: Vec<String>,
    pub name: Vec<String>,
    pub image: Vec<String>,
    pub cost: Vec<String>,
    pub power: Vec<String>,
    pub counter: Vec<String>,
    pub color: Vec<String>,
    pub block: Vec<String>,
    pub traits: Vec<String>,
    pub effect: Vec<String>,
    pub trigger: Vec<String>,
    pub source_info: Vec<String>,
    pub attribute_image: Vec<String>,
    /// Field label removed from a field's text before it is read
    pub field_heading: String,
    /// Element holding the illustration kind inside a card container
    pub illustration_type: Vec<String>,
    /// Attribute on the card container identifying the print
    pub modal_id_attribute: String,
    /// Element whose text carries the result count (`123件HIT`)
    pub hit_count: Vec<String>,
}

fn list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            series_option: list(&["select.selectModal option", "select[name=series] option"]),
            card_container: list(&[".resultCol .modalCol"]),
            info_spans: list(&[".infoCol span"]),
            name: list(&[".cardName"]),
            image: list(&[".frontCol img"]),
            cost: list(&[".cost"]),
            power: list(&[".power"]),
            counter: list(&[".counter"]),
            color: list(&[".color"]),
            block: list(&[".block"]),
            traits: list(&[".feature"]),
            effect: list(&[".text"]),
            trigger: list(&[".trigger"]),
            source_info: list(&[".getInfo"]),
            attribute_image: list(&[".attribute img"]),
            field_heading: "h3".to_string(),
            illustration_type: list(&[".illustType", ".illustration"]),
            modal_id_attribute: "id".to_string(),
            hit_count: list(&[".resultCol .resultHead span", ".searchResult .count"]),
        }
    }
}

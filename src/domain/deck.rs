//! Decks and deck composition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SHARE_CODE_LEN: usize = 8;
const SHARE_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const DEFAULT_FORMAT: &str = "standard";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub format: String,
    pub leader_version_id: Option<i64>,
    pub is_public: bool,
    pub share_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeck {
    pub name: String,
    pub description: Option<String>,
    pub format: String,
    pub is_public: bool,
}

impl NewDeck {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            format: DEFAULT_FORMAT.to_string(),
            is_public: false,
        }
    }
}

/// A version and how many copies of it the deck runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckCard {
    pub id: i64,
    pub deck_id: i64,
    pub version_id: i64,
    pub quantity: i64,
}

/// Deck card joined with what the deck summary needs from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckCardDetail {
    pub version_id: i64,
    pub quantity: i64,
    pub card_number: String,
    pub name: String,
    pub card_type: String,
    pub latest_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckSummary {
    pub deck: Deck,
    pub cards: Vec<DeckCardDetail>,
}

impl DeckSummary {
    pub fn total_cards(&self) -> i64 {
        self.cards.iter().map(|c| c.quantity).sum()
    }

    /// First card in the deck whose type is LEADER
    pub fn leader(&self) -> Option<&DeckCardDetail> {
        self.cards
            .iter()
            .find(|c| c.card_type == crate::domain::card::LEADER)
    }

    /// Sum of latest known price × quantity; unpriced cards count as zero.
    pub fn estimated_price(&self) -> f64 {
        self.cards
            .iter()
            .filter_map(|c| c.latest_price.map(|p| p * c.quantity as f64))
            .sum()
    }
}

/// Random 8 character share code from `A-Z0-9`
pub fn generate_share_code() -> String {
    (0..SHARE_CODE_LEN)
        .map(|_| {
            let idx = fastrand::usize(..SHARE_CODE_ALPHABET.len());
            char::from(SHARE_CODE_ALPHABET[idx])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(card_type: &str, quantity: i64, price: Option<f64>) -> DeckCardDetail {
        DeckCardDetail {
            version_id: quantity,
            quantity,
            card_number: "OP01-001".into(),
            name: "x".into(),
            card_type: card_type.into(),
            latest_price: price,
        }
    }

    fn summary(cards: Vec<DeckCardDetail>) -> DeckSummary {
        let now = Utc::now();
        DeckSummary {
            deck: Deck {
                id: 1,
                user_id: 1,
                name: "Red Zoro".into(),
                description: None,
                format: DEFAULT_FORMAT.into(),
                leader_version_id: None,
                is_public: true,
                share_code: generate_share_code(),
                created_at: now,
                updated_at: now,
            },
            cards,
        }
    }

    #[test]
    fn share_codes_are_eight_uppercase_alphanumerics() {
        for _ in 0..100 {
            let code = generate_share_code();
            assert_eq!(code.len(), SHARE_CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn totals_leader_and_price() {
        let s = summary(vec![
            detail("CHARACTER", 4, Some(1.5)),
            detail("LEADER", 1, Some(10.0)),
            detail("EVENT", 2, None),
        ]);
        assert_eq!(s.total_cards(), 7);
        assert_eq!(s.leader().map(|c| c.quantity), Some(1));
        assert!((s.estimated_price() - 16.0).abs() < f64::EPSILON);
    }

    #[test]
    fn deck_without_leader() {
        let s = summary(vec![detail("CHARACTER", 4, None)]);
        assert!(s.leader().is_none());
        assert!(s.estimated_price().abs() < f64::EPSILON);
    }
}

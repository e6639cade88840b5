//! Owned cards and wishlists

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CONDITION: &str = "near_mint";

/// One owned stack of a version in a given condition and grade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub id: i64,
    pub user_id: i64,
    pub version_id: i64,
    pub quantity: i64,
    pub condition: String,
    pub grade: Option<String>,
    pub purchase_price: Option<f64>,
    pub purchase_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to add cards to a collection. Entries with the same
/// version, condition and grade are merged by summing quantities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionAdd {
    pub version_id: i64,
    pub quantity: i64,
    pub condition: String,
    pub grade: Option<String>,
    pub purchase_price: Option<f64>,
    pub purchase_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl CollectionAdd {
    pub fn new(version_id: i64, quantity: i64) -> Self {
        Self {
            version_id,
            quantity,
            condition: DEFAULT_CONDITION.to_string(),
            grade: None,
            purchase_price: None,
            purchase_date: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WishPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl WishPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for WishPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub id: i64,
    pub user_id: i64,
    pub version_id: i64,
    pub quantity: i64,
    pub max_price: Option<f64>,
    pub priority: WishPriority,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::CatalogError;

/// Card text language. Card and series identities are scoped by language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Jp,
    En,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Jp, Language::En];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jp => "jp",
            Self::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jp" | "ja" => Ok(Self::Jp),
            "en" => Ok(Self::En),
            other => Err(CatalogError::InvalidLanguage(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_codes() {
        assert_eq!("jp".parse::<Language>().unwrap(), Language::Jp);
        assert_eq!("JA".parse::<Language>().unwrap(), Language::Jp);
        assert_eq!(" en ".parse::<Language>().unwrap(), Language::En);
    }

    #[test]
    fn rejects_unknown_codes() {
        let err = "fr".parse::<Language>().unwrap_err();
        assert_eq!(err, CatalogError::InvalidLanguage("fr".into()));
    }
}

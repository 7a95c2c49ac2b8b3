//! Session data model
//!
//! Competitor records with their speech/question logs, debate sides, and the
//! bounded history of count-changing actions.

pub mod competitor;
pub mod history;

pub use competitor::{Competitor, Notes, QuestionEntry, SpeechEntry};
pub use history::{HistoryItem, HistoryLog, HISTORY_CAPACITY};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Activity category tracked per competitor
///
/// Doubles as the `actionType` of history entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Speech,
    Question,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Speech, Category::Question];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Speech => "speech",
            Category::Question => "question",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "speech" | "speeches" => Ok(Category::Speech),
            "question" | "questions" => Ok(Category::Question),
            other => Err(Error::InvalidInput(format!("unknown category '{}'", other))),
        }
    }
}

/// Stance on the active resolution
///
/// Stored on competitor records in its short form (`Aff`/`Neg`); the long
/// form is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "Aff", alias = "Affirmative")]
    Affirmative,
    #[serde(rename = "Neg", alias = "Negative")]
    Negative,
}

impl Side {
    /// Short label used on records and list displays
    pub fn abbrev(&self) -> &'static str {
        match self {
            Side::Affirmative => "Aff",
            Side::Negative => "Neg",
        }
    }

    /// Long label used for the session's next-side pointer
    pub fn long_name(&self) -> &'static str {
        match self {
            Side::Affirmative => "Affirmative",
            Side::Negative => "Negative",
        }
    }

    pub fn toggled(&self) -> Side {
        match self {
            Side::Affirmative => Side::Negative,
            Side::Negative => Side::Affirmative,
        }
    }

    /// Lenient parse of either label, case-insensitive
    ///
    /// Returns `None` for empty or unrecognised text, which persisted records
    /// use to mean "no side".
    pub fn parse_label(s: &str) -> Option<Side> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aff" | "affirmative" => Some(Side::Affirmative),
            "neg" | "negative" => Some(Side::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.long_name())
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Side::parse_label(s).ok_or_else(|| Error::InvalidInput(format!("unknown side '{}'", s)))
    }
}

/// Serde adapter for `Option<Side>` stored as `""`, `"Aff"` or `"Neg"`
pub(crate) mod side_text {
    use super::Side;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(side: &Option<Side>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(side.map(|v| v.abbrev()).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Side>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.as_deref().and_then(Side::parse_label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_toggle_alternates() {
        assert_eq!(Side::Affirmative.toggled(), Side::Negative);
        assert_eq!(Side::Negative.toggled().toggled(), Side::Negative);
    }

    #[test]
    fn test_side_parse_accepts_both_forms() {
        assert_eq!(Side::parse_label("Aff"), Some(Side::Affirmative));
        assert_eq!(Side::parse_label("negative"), Some(Side::Negative));
        assert_eq!(Side::parse_label(""), None);
        assert!("sideways".parse::<Side>().is_err());
    }

    #[test]
    fn test_side_serde_uses_short_form() {
        assert_eq!(serde_json::to_string(&Side::Negative).unwrap(), "\"Neg\"");
        let parsed: Side = serde_json::from_str("\"Affirmative\"").unwrap();
        assert_eq!(parsed, Side::Affirmative);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Speeches".parse::<Category>().unwrap(), Category::Speech);
        assert_eq!("question".parse::<Category>().unwrap(), Category::Question);
        assert!("votes".parse::<Category>().is_err());
    }
}

//! Competitor record
//!
//! One participant with speech/question counts, recency markers, derived
//! ranks, per-resolution side memory and the free-text notes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use super::{side_text, Category, Side};

/// One logged speech
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechEntry {
    /// Session round the speech was given in
    pub round: u32,
    /// Side argued (`None` when recorded without one)
    #[serde(default, with = "side_text")]
    pub side: Option<Side>,
    /// Speech length in seconds (0 when not timed)
    #[serde(default, rename = "duration")]
    pub duration_secs: u64,
    #[serde(default)]
    pub timestamp: String,
    /// Resolution title active at the time (empty if none)
    #[serde(default)]
    pub resolution: String,
}

/// One logged question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionEntry {
    pub round: u32,
    #[serde(default)]
    pub timestamp: String,
}

/// Structured notes persisted alongside each competitor row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notes {
    pub speeches: Vec<SpeechEntry>,
    pub questions: Vec<QuestionEntry>,
    pub general: String,
    /// Last side spoken per resolution title
    #[serde(default)]
    pub resolution_sides: BTreeMap<String, Side>,
}

impl Notes {
    /// Build notes from loosely-typed JSON, keeping whatever is usable
    ///
    /// Non-object entries and entries missing required fields are dropped
    /// one by one; a non-object root yields empty notes.
    pub fn from_value(value: Value) -> Notes {
        let Value::Object(mut map) = value else {
            return Notes::default();
        };

        let speeches = entries(map.remove("speeches"), "speech");
        let questions = entries(map.remove("questions"), "question");
        let general = match map.remove("general") {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        let resolution_sides = match map.remove("resolution_sides") {
            Some(Value::Object(sides)) => sides
                .into_iter()
                .filter_map(|(title, side)| {
                    side.as_str().and_then(Side::parse_label).map(|s| (title, s))
                })
                .collect(),
            _ => BTreeMap::new(),
        };

        Notes {
            speeches,
            questions,
            general,
            resolution_sides,
        }
    }

    /// Parse the JSON text stored in the competitor table's `notes` column
    pub fn from_json_text(text: &str) -> Notes {
        if text.trim().is_empty() {
            return Notes::default();
        }
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Notes::from_value(value),
            Err(e) => {
                warn!("Discarding unreadable notes: {}", e);
                Notes::default()
            }
        }
    }
}

fn entries<T: serde::de::DeserializeOwned>(raw: Option<Value>, kind: &str) -> Vec<T> {
    let Some(Value::Array(items)) = raw else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| {
            if !item.is_object() {
                warn!("Dropping non-object {} record", kind);
                return None;
            }
            match serde_json::from_value::<T>(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Dropping malformed {} record: {}", kind, e);
                    None
                }
            }
        })
        .collect()
}

/// A participant and their activity history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Competitor {
    /// Identity key, unique case-insensitively within a session
    pub name: String,
    pub speech_count: u32,
    pub question_count: u32,
    pub last_speech_round: u32,
    pub last_question_round: u32,
    /// 1 = next to speak; recomputed by the rank engine
    pub speech_rank: u32,
    /// 1 = next to ask; recomputed by the rank engine
    pub question_rank: u32,
    /// Side for the currently active resolution
    pub current_side: Option<Side>,
    pub notes: Notes,
}

impl Competitor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            speech_count: 0,
            question_count: 0,
            last_speech_round: 0,
            last_question_round: 0,
            speech_rank: 0,
            question_rank: 0,
            current_side: None,
            notes: Notes::default(),
        }
    }

    /// Case-insensitive name comparison
    pub fn is_named(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }

    /// Append a speech record and count it
    ///
    /// The counter is incremented rather than derived from the records, so a
    /// count put back by a history restore carries forward.
    pub fn add_speech(&mut self, round: u32, side: Option<Side>, duration_secs: u64, resolution: &str) {
        self.notes.speeches.push(SpeechEntry {
            round,
            side,
            duration_secs,
            timestamp: crate::time::record_timestamp(),
            resolution: resolution.to_string(),
        });
        self.speech_count += 1;
        self.current_side = side;
        self.last_speech_round = round;
    }

    /// Append a question record and count it
    pub fn add_question(&mut self, round: u32) {
        self.notes.questions.push(QuestionEntry {
            round,
            timestamp: crate::time::record_timestamp(),
        });
        self.question_count += 1;
        self.last_question_round = round;
    }

    pub fn count(&self, category: Category) -> u32 {
        match category {
            Category::Speech => self.speech_count,
            Category::Question => self.question_count,
        }
    }

    pub fn set_count(&mut self, category: Category, value: u32) {
        match category {
            Category::Speech => self.speech_count = value,
            Category::Question => self.question_count = value,
        }
    }

    pub fn last_round(&self, category: Category) -> u32 {
        match category {
            Category::Speech => self.last_speech_round,
            Category::Question => self.last_question_round,
        }
    }

    pub fn set_last_round(&mut self, category: Category, round: u32) {
        match category {
            Category::Speech => self.last_speech_round = round,
            Category::Question => self.last_question_round = round,
        }
    }

    pub fn rank(&self, category: Category) -> u32 {
        match category {
            Category::Speech => self.speech_rank,
            Category::Question => self.question_rank,
        }
    }

    pub fn set_rank(&mut self, category: Category, rank: u32) {
        match category {
            Category::Speech => self.speech_rank = rank,
            Category::Question => self.question_rank = rank,
        }
    }

    /// Remember the side argued on a resolution
    pub fn remember_side(&mut self, resolution: &str, side: Side) {
        self.notes.resolution_sides.insert(resolution.to_string(), side);
    }

    /// Side this competitor last argued on `resolution`
    ///
    /// Uses the remembered side when present, otherwise the most recent speech
    /// record on that resolution that carries a side.
    pub fn side_for_resolution(&self, resolution: &str) -> Option<Side> {
        if let Some(side) = self.notes.resolution_sides.get(resolution) {
            return Some(*side);
        }
        self.notes
            .speeches
            .iter()
            .rev()
            .filter(|s| s.resolution == resolution)
            .find_map(|s| s.side)
    }

    /// Speech records, optionally restricted to one resolution
    pub fn speeches_on(&self, resolution: Option<&str>) -> Vec<&SpeechEntry> {
        self.notes
            .speeches
            .iter()
            .filter(|s| resolution.map_or(true, |r| s.resolution == r))
            .collect()
    }

    /// Fixed-width list line, e.g. `Alice               [Aff]  | Speeches: 2   | Rank: 3`
    pub fn display_line(&self, category: Category, show_side: bool) -> String {
        let side = match (show_side, self.current_side) {
            (true, Some(side)) => format!("[{}]", side.abbrev()),
            _ => String::new(),
        };
        let label = match category {
            Category::Speech => "Speeches",
            Category::Question => "Questions",
        };
        format!(
            "{:<20}{:^6} | {}: {:<3} | Rank: {}",
            self.name,
            side,
            label,
            self.count(category),
            self.rank(category)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_speech_keeps_count_in_step_with_records() {
        let mut c = Competitor::new("Alice");
        c.add_speech(0, Some(Side::Affirmative), 120, "Topic A");
        c.add_speech(3, Some(Side::Negative), 90, "Topic B");
        assert_eq!(c.speech_count, 2);
        assert_eq!(c.notes.speeches.len(), 2);
        assert_eq!(c.current_side, Some(Side::Negative));
        assert_eq!(c.last_speech_round, 3);
    }

    #[test]
    fn test_add_question_updates_count_and_round() {
        let mut c = Competitor::new("Bob");
        c.add_question(4);
        assert_eq!(c.question_count, 1);
        assert_eq!(c.last_question_round, 4);
        assert_eq!(c.notes.questions[0].round, 4);
    }

    #[test]
    fn test_counts_increment_from_restored_value() {
        let mut c = Competitor::new("Bob");
        c.add_question(0);
        c.add_question(1);
        c.set_count(Category::Question, 0);
        c.add_question(2);
        assert_eq!(c.question_count, 1);
        assert_eq!(c.notes.questions.len(), 3);

        c.add_speech(3, None, 0, "");
        c.set_count(Category::Speech, 0);
        c.add_speech(4, None, 0, "");
        assert_eq!(c.speech_count, 1);
    }

    #[test]
    fn test_side_for_resolution_prefers_memory() {
        let mut c = Competitor::new("Alice");
        c.add_speech(0, Some(Side::Affirmative), 0, "Topic A");
        c.remember_side("Topic A", Side::Negative);
        assert_eq!(c.side_for_resolution("Topic A"), Some(Side::Negative));
    }

    #[test]
    fn test_side_for_resolution_scans_latest_record() {
        let mut c = Competitor::new("Alice");
        c.add_speech(0, Some(Side::Affirmative), 0, "Topic A");
        c.add_speech(1, Some(Side::Negative), 0, "Topic B");
        c.add_speech(2, Some(Side::Negative), 0, "Topic A");
        assert_eq!(c.side_for_resolution("Topic A"), Some(Side::Negative));
        assert_eq!(c.side_for_resolution("Topic C"), None);
    }

    #[test]
    fn test_is_named_ignores_case() {
        let c = Competitor::new("Carol");
        assert!(c.is_named("carol"));
        assert!(!c.is_named("Caro"));
    }

    #[test]
    fn test_notes_from_value_drops_garbage_entries() {
        let notes = Notes::from_value(json!({
            "speeches": [
                {"round": 1, "side": "Aff", "duration": 60, "timestamp": "t", "resolution": "R"},
                "not a record",
                {"side": "Neg"},
                {"round": 4}
            ],
            "questions": [{"round": 2, "timestamp": "t"}, 7],
            "general": "strong rebuttals"
        }));
        assert_eq!(notes.speeches.len(), 2);
        assert_eq!(notes.speeches[1].side, None);
        assert_eq!(notes.speeches[1].resolution, "");
        assert_eq!(notes.questions.len(), 1);
        assert_eq!(notes.general, "strong rebuttals");
        assert!(notes.resolution_sides.is_empty());
    }

    #[test]
    fn test_notes_from_bad_text_defaults() {
        assert_eq!(Notes::from_json_text("{not json"), Notes::default());
        assert_eq!(Notes::from_json_text(""), Notes::default());
        assert_eq!(Notes::from_json_text("[1,2]"), Notes::default());
    }

    #[test]
    fn test_notes_json_round_trip_keeps_side_memory() {
        let mut c = Competitor::new("Dana");
        c.add_speech(0, Some(Side::Negative), 30, "Topic A");
        c.remember_side("Topic A", Side::Negative);
        let text = serde_json::to_string(&c.notes).unwrap();
        assert_eq!(Notes::from_json_text(&text), c.notes);
    }

    #[test]
    fn test_display_line_shows_side_only_when_requested() {
        let mut c = Competitor::new("Alice");
        c.current_side = Some(Side::Affirmative);
        c.speech_rank = 2;
        assert!(c.display_line(Category::Speech, true).contains("[Aff]"));
        assert!(!c.display_line(Category::Speech, false).contains("[Aff]"));
        assert!(c.display_line(Category::Speech, true).ends_with("Rank: 2"));
    }
}

//! Persistence gateway
//!
//! One session is stored as a base CSV file of competitor rows plus three JSON
//! side files named after it:
//!
//! - `<stem>_history.json`: history entries
//! - `<stem>_recency.json`: recency orders, ordering modes, round counter
//! - `<stem>_resolutions.json`: resolution list, active title, next side
//!
//! Loading is forgiving: a missing or unreadable side file yields defaults and
//! malformed rows or entries are dropped individually. Only an unreadable base
//! file fails the load.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::model::{Competitor, HistoryItem, Notes, Side};
use crate::ranking::OrderingMode;
use crate::Result;

const HISTORY_SUFFIX: &str = "history";
const RECENCY_SUFFIX: &str = "recency";
const RESOLUTIONS_SUFFIX: &str = "resolutions";

const COLUMNS: [&str; 9] = [
    "name",
    "speeches",
    "questions",
    "last_speech_round",
    "last_question_round",
    "speech_rank",
    "question_rank",
    "current_side",
    "notes",
];

/// Everything a session persists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub competitors: Vec<Competitor>,
    pub history: Vec<HistoryItem>,
    pub speech_recency: Vec<String>,
    pub question_recency: Vec<String>,
    /// `None` when the stored file predates mode tracking
    pub speech_mode: Option<OrderingMode>,
    pub question_mode: Option<OrderingMode>,
    /// `None` when not stored; recovered from competitor rounds
    pub current_round: Option<u32>,
    pub resolution_list: Vec<String>,
    pub current_resolution: Option<String>,
    pub current_side: Side,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            competitors: Vec::new(),
            history: Vec::new(),
            speech_recency: Vec::new(),
            question_recency: Vec::new(),
            speech_mode: None,
            question_mode: None,
            current_round: None,
            resolution_list: Vec::new(),
            current_resolution: None,
            current_side: Side::Affirmative,
        }
    }
}

/// Durable store for sessions
pub trait SessionStore {
    fn load(&self, path: &Path) -> Result<SessionSnapshot>;
    fn save(&self, path: &Path, snapshot: &SessionSnapshot) -> Result<()>;
    /// Remove the base file and all side files; missing files are fine
    fn clear(&self, path: &Path) -> Result<()>;
}

/// CSV + JSON side-file store
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvStore;

/// Side file path: `dir/<stem>_<suffix>.json`
pub fn side_file_path(base: &Path, suffix: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.with_file_name(format!("{}_{}.json", stem, suffix))
}

/// All files belonging to a session, base first
pub fn session_files(base: &Path) -> Vec<PathBuf> {
    vec![
        base.to_path_buf(),
        side_file_path(base, HISTORY_SUFFIX),
        side_file_path(base, RECENCY_SUFFIX),
        side_file_path(base, RESOLUTIONS_SUFFIX),
    ]
}

/// Write via a sibling temp file and rename over the target
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[derive(Serialize)]
struct CompetitorRow<'a> {
    name: &'a str,
    speeches: u32,
    questions: u32,
    last_speech_round: u32,
    last_question_round: u32,
    speech_rank: u32,
    question_rank: u32,
    current_side: &'a str,
    notes: String,
}

impl SessionStore for CsvStore {
    fn load(&self, path: &Path) -> Result<SessionSnapshot> {
        let competitors = read_competitors(path)?;
        let history = read_history(&side_file_path(path, HISTORY_SUFFIX));
        let recency = read_object(&side_file_path(path, RECENCY_SUFFIX));
        let resolutions = read_object(&side_file_path(path, RESOLUTIONS_SUFFIX));

        let current_resolution = field::<String>(&resolutions, "currentResolution")
            .filter(|r| !r.trim().is_empty());
        let current_side = field::<String>(&resolutions, "currentSide")
            .and_then(|s| Side::parse_label(&s))
            .unwrap_or(Side::Affirmative);

        let snapshot = SessionSnapshot {
            competitors,
            history,
            speech_recency: field(&recency, "speechRecencyOrder").unwrap_or_default(),
            question_recency: field(&recency, "questionRecencyOrder").unwrap_or_default(),
            speech_mode: field(&recency, "speechOrderingMode"),
            question_mode: field(&recency, "questionOrderingMode"),
            current_round: field(&recency, "currentRound"),
            resolution_list: field(&resolutions, "resolutionList").unwrap_or_default(),
            current_resolution,
            current_side,
        };
        info!(
            "Loaded {} competitors and {} history entries from {}",
            snapshot.competitors.len(),
            snapshot.history.len(),
            path.display()
        );
        Ok(snapshot)
    }

    fn save(&self, path: &Path, snapshot: &SessionSnapshot) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        if snapshot.competitors.is_empty() {
            writer.write_record(COLUMNS)?;
        }
        for c in &snapshot.competitors {
            writer.serialize(CompetitorRow {
                name: &c.name,
                speeches: c.speech_count,
                questions: c.question_count,
                last_speech_round: c.last_speech_round,
                last_question_round: c.last_question_round,
                speech_rank: c.speech_rank,
                question_rank: c.question_rank,
                current_side: c.current_side.map(|s| s.abbrev()).unwrap_or(""),
                notes: serde_json::to_string(&c.notes)?,
            })?;
        }
        let table = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(ErrorKind::Other, e.to_string()))?;
        write_atomic(path, &table)?;

        write_json(&side_file_path(path, HISTORY_SUFFIX), &snapshot.history)?;
        write_json(
            &side_file_path(path, RECENCY_SUFFIX),
            &json!({
                "speechRecencyOrder": snapshot.speech_recency,
                "questionRecencyOrder": snapshot.question_recency,
                "speechOrderingMode": snapshot.speech_mode,
                "questionOrderingMode": snapshot.question_mode,
                "currentRound": snapshot.current_round,
            }),
        )?;
        write_json(
            &side_file_path(path, RESOLUTIONS_SUFFIX),
            &json!({
                "resolutionList": snapshot.resolution_list,
                "currentResolution": snapshot.current_resolution.clone().unwrap_or_default(),
                "currentSide": snapshot.current_side.long_name(),
            }),
        )?;
        debug!("Saved session to {}", path.display());
        Ok(())
    }

    fn clear(&self, path: &Path) -> Result<()> {
        let mut first_error = None;
        for file in session_files(path) {
            match fs::remove_file(&file) {
                Ok(()) => debug!("Removed {}", file.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Could not remove {}: {}", file.display(), e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &text)
}

fn read_competitors(path: &Path) -> Result<Vec<Competitor>> {
    let file = fs::File::open(path)?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);

    let Some(name_col) = column("name") else {
        warn!("{} has no 'name' column; no competitors loaded", path.display());
        return Ok(Vec::new());
    };
    let speeches_col = column("speeches");
    let questions_col = column("questions");
    let last_speech_col = column("last_speech_round");
    let last_question_col = column("last_question_round");
    let speech_rank_col = column("speech_rank");
    let question_rank_col = column("question_rank");
    let side_col = column("current_side");
    let notes_col = column("notes");

    let mut competitors: Vec<Competitor> = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping unreadable row {}: {}", line + 2, e);
                continue;
            }
        };
        let text = |col: Option<usize>| col.and_then(|i| record.get(i)).unwrap_or("");
        let number = |col: Option<usize>| parse_count(text(col));

        let name = text(Some(name_col)).trim();
        if name.is_empty() {
            continue;
        }
        if competitors.iter().any(|c| c.is_named(name)) {
            warn!("Skipping duplicate competitor row '{}'", name);
            continue;
        }

        let mut c = Competitor::new(name);
        c.speech_count = number(speeches_col);
        c.question_count = number(questions_col);
        c.last_speech_round = number(last_speech_col);
        c.last_question_round = number(last_question_col);
        c.speech_rank = number(speech_rank_col);
        c.question_rank = number(question_rank_col);
        c.current_side = Side::parse_label(text(side_col));
        c.notes = Notes::from_json_text(text(notes_col));
        competitors.push(c);
    }
    Ok(competitors)
}

/// Non-negative integer with a zero fallback; tolerates `"3.0"`
fn parse_count(raw: &str) -> u32 {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return n;
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f <= u32::MAX as f64 => f as u32,
        _ => 0,
    }
}

fn read_json(path: &Path) -> Option<Value> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Could not read {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}

fn read_object(path: &Path) -> Map<String, Value> {
    match read_json(path) {
        Some(Value::Object(map)) => map,
        Some(_) => {
            warn!("Ignoring {}: expected a JSON object", path.display());
            Map::new()
        }
        None => Map::new(),
    }
}

fn read_history(path: &Path) -> Vec<HistoryItem> {
    let Some(value) = read_json(path) else {
        return Vec::new();
    };
    let Value::Array(items) = value else {
        warn!("Ignoring {}: expected a JSON array", path.display());
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<HistoryItem>(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Dropping malformed history entry: {}", e);
                None
            }
        })
        .collect()
}

/// Typed field lookup; absent, null or mistyped values read as `None`
fn field<T: DeserializeOwned>(map: &Map<String, Value>, key: &str) -> Option<T> {
    let value = map.get(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Ignoring field '{}': {}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_side_file_path_replaces_extension() {
        let base = Path::new("/data/congress_tracker_data.csv");
        assert_eq!(
            side_file_path(base, "history"),
            PathBuf::from("/data/congress_tracker_data_history.json")
        );
    }

    #[test]
    fn test_parse_count_is_forgiving() {
        assert_eq!(parse_count("7"), 7);
        assert_eq!(parse_count(" 3.0 "), 3);
        assert_eq!(parse_count("-2"), 0);
        assert_eq!(parse_count("many"), 0);
        assert_eq!(parse_count(""), 0);
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("out.json");
        write_atomic(&target, b"[]").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "[]");
        assert!(!dir.path().join("nested").join("out.json.tmp").exists());
    }

    #[test]
    fn test_load_missing_base_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = CsvStore.load(&dir.path().join("absent.csv")).unwrap_err();
        assert!(err.is_persistence());
    }

    #[test]
    fn test_field_ignores_wrong_types() {
        let map = json!({"currentRound": "seven", "speechRecencyOrder": ["A"]});
        let Value::Object(map) = map else { unreachable!() };
        assert_eq!(field::<u32>(&map, "currentRound"), None);
        assert_eq!(field::<Vec<String>>(&map, "speechRecencyOrder"), Some(vec!["A".to_string()]));
        assert_eq!(field::<u32>(&map, "missing"), None);
    }

    #[test]
    fn test_empty_session_still_writes_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        CsvStore.save(&path, &SessionSnapshot::default()).unwrap();

        let table = fs::read_to_string(&path).unwrap();
        assert_eq!(table.lines().next(), Some(COLUMNS.join(",").as_str()));
        let loaded = CsvStore.load(&path).unwrap();
        assert!(loaded.competitors.is_empty());
        assert_eq!(loaded.current_side, Side::Affirmative);
    }
}

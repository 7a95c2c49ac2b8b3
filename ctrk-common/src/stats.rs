//! Session statistics and status summaries
//!
//! Read-only views over the competitor list: per-resolution speech statistics
//! and the session-file status panel.

use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::model::{Competitor, Side};
use crate::time::format_minutes_seconds;

/// Which speeches a statistics table covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionFilter<'a> {
    All,
    Only(&'a str),
}

impl<'a> ResolutionFilter<'a> {
    /// `"All"` (any case) selects every speech, anything else one resolution
    pub fn parse(s: &'a str) -> Self {
        if s.trim().eq_ignore_ascii_case("all") {
            ResolutionFilter::All
        } else {
            ResolutionFilter::Only(s.trim())
        }
    }

    fn as_option(self) -> Option<&'a str> {
        match self {
            ResolutionFilter::All => None,
            ResolutionFilter::Only(title) => Some(title),
        }
    }
}

/// One row of the statistics table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechStats {
    pub name: String,
    /// Most frequent side; ties go to the side spoken most recently
    pub side: Option<Side>,
    pub speech_count: usize,
    /// Floored mean of recorded durations, `None` when nothing was timed
    pub average_secs: Option<u64>,
}

impl SpeechStats {
    /// Average rendered as `m:ss`, or `n/a`
    pub fn average_display(&self) -> String {
        self.average_secs
            .map(format_minutes_seconds)
            .unwrap_or_else(|| "n/a".to_string())
    }
}

/// Statistics for every competitor with at least one matching speech, in
/// competitor order
pub fn resolution_stats(competitors: &[Competitor], filter: ResolutionFilter<'_>) -> Vec<SpeechStats> {
    competitors
        .iter()
        .filter_map(|c| {
            let speeches = c.speeches_on(filter.as_option());
            if speeches.is_empty() {
                return None;
            }
            let total: u64 = speeches.iter().map(|s| s.duration_secs).sum();
            let count = speeches.len();
            Some(SpeechStats {
                name: c.name.clone(),
                side: predominant_side(speeches.iter().map(|s| s.side)),
                speech_count: count,
                average_secs: (total > 0).then(|| total / count as u64),
            })
        })
        .collect()
}

/// Most frequent side in chronological `sides`
fn predominant_side(sides: impl Iterator<Item = Option<Side>>) -> Option<Side> {
    let mut aff = 0usize;
    let mut neg = 0usize;
    let mut last = None;
    for side in sides.flatten() {
        match side {
            Side::Affirmative => aff += 1,
            Side::Negative => neg += 1,
        }
        last = Some(side);
    }
    match aff.cmp(&neg) {
        std::cmp::Ordering::Greater => Some(Side::Affirmative),
        std::cmp::Ordering::Less => Some(Side::Negative),
        std::cmp::Ordering::Equal => last,
    }
}

/// Status panel for a tracked session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub path: PathBuf,
    /// `None` when the file could not be read
    pub size_bytes: Option<u64>,
    /// Local `YYYY-MM-DD HH:MM:SS`
    pub last_modified: Option<String>,
    pub competitors: usize,
    pub total_speeches: u64,
    pub total_questions: u64,
}

impl SessionStatus {
    pub fn collect(path: &Path, competitors: &[Competitor]) -> Self {
        let metadata = std::fs::metadata(path);
        if let Err(e) = &metadata {
            debug!("No metadata for {}: {}", path.display(), e);
        }
        let metadata = metadata.ok();
        Self {
            path: path.to_path_buf(),
            size_bytes: metadata.as_ref().map(|m| m.len()),
            last_modified: metadata.and_then(|m| m.modified().ok()).map(|t| {
                DateTime::<Local>::from(t)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            }),
            competitors: competitors.len(),
            total_speeches: competitors.iter().map(|c| u64::from(c.speech_count)).sum(),
            total_questions: competitors.iter().map(|c| u64::from(c.question_count)).sum(),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File Path:       {}", self.path.display())?;
        writeln!(
            f,
            "File Size:       {}",
            self.size_bytes.map(format_size).unwrap_or_else(|| "N/A".to_string())
        )?;
        writeln!(
            f,
            "Last Modified:   {}",
            self.last_modified.as_deref().unwrap_or("N/A")
        )?;
        writeln!(f, "Competitors:     {}", self.competitors)?;
        writeln!(f, "Total Speeches:  {}", self.total_speeches)?;
        write!(f, "Total Questions: {}", self.total_questions)
    }
}

/// Human-readable byte count with one decimal, e.g. `1.5 KB`
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} GB", size)
}

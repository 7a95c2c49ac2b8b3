//! Session controller
//!
//! Owns the competitor list and all session state, applies user actions, and
//! keeps derived state current: after every change ranks are recomputed and
//! the session is saved through its [`SessionStore`].
//!
//! Operations either apply fully or return an error with nothing changed.
//! Saving happens after a change has been applied, so a failed save is
//! reported as [`Persisted::Failed`] and the in-memory state stays
//! authoritative.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::unique_session_path;
use crate::model::{Category, Competitor, HistoryItem, HistoryLog, Side};
use crate::persistence::{CsvStore, SessionSnapshot, SessionStore};
use crate::ranking::{assign_ranks, Direction, MoveOutcome, OrderingMode, RecencyOrder};
use crate::resolution::{restore_sides, ResolutionState, ResolutionTracker, Transition};
use crate::{Error, Result};

/// Outcome of the save that follows an applied change
#[derive(Debug)]
#[must_use]
pub enum Persisted {
    /// Written to the store
    Saved,
    /// Nothing changed, nothing written
    Unchanged,
    /// No session file yet (tracking not started)
    NoPath,
    /// Change applied in memory but the store rejected it
    Failed(Error),
}

impl Persisted {
    pub fn is_saved(&self) -> bool {
        matches!(self, Persisted::Saved)
    }

    /// The save error, if any, for display as a warning
    pub fn warning(&self) -> Option<&Error> {
        match self {
            Persisted::Failed(e) => Some(e),
            _ => None,
        }
    }
}

pub struct Session<S: SessionStore = CsvStore> {
    competitors: Vec<Competitor>,
    current_round: u32,
    resolutions: ResolutionTracker,
    speech_order: RecencyOrder,
    question_order: RecencyOrder,
    history: HistoryLog,
    tracking: bool,
    path: Option<PathBuf>,
    store: S,
}

impl Session<CsvStore> {
    /// Empty session backed by the CSV store
    pub fn new() -> Self {
        Self::with_store(CsvStore)
    }

    /// Load a CSV session; the loaded session is tracking
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(CsvStore, path)
    }
}

impl Default for Session<CsvStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SessionStore> Session<S> {
    pub fn with_store(store: S) -> Self {
        Self {
            competitors: Vec::new(),
            current_round: 0,
            resolutions: ResolutionTracker::new(),
            speech_order: RecencyOrder::new(Category::Speech),
            question_order: RecencyOrder::new(Category::Question),
            history: HistoryLog::new(),
            tracking: false,
            path: None,
            store,
        }
    }

    pub fn open_with(store: S, path: &Path) -> Result<Self> {
        let snapshot = store.load(path)?;
        Ok(Self::from_snapshot(store, snapshot, path.to_path_buf()))
    }

    /// Rebuild a tracking session from stored state
    ///
    /// Missing ordering modes are derived from counts and a missing round
    /// counter is recovered from the competitors' last rounds.
    pub fn from_snapshot(store: S, snapshot: SessionSnapshot, path: PathBuf) -> Self {
        let competitors = snapshot.competitors;

        let speech_mode = snapshot
            .speech_mode
            .unwrap_or_else(|| OrderingMode::derive(&competitors, Category::Speech));
        let question_mode = snapshot
            .question_mode
            .unwrap_or_else(|| OrderingMode::derive(&competitors, Category::Question));
        let mut speech_order =
            RecencyOrder::with_names(Category::Speech, snapshot.speech_recency, speech_mode);
        let mut question_order =
            RecencyOrder::with_names(Category::Question, snapshot.question_recency, question_mode);
        speech_order.reconcile(&competitors);
        question_order.reconcile(&competitors);

        let current_round = snapshot.current_round.unwrap_or_else(|| {
            competitors
                .iter()
                .map(|c| c.last_speech_round.max(c.last_question_round))
                .max()
                .unwrap_or(0)
        });

        let mut session = Self {
            competitors,
            current_round,
            resolutions: ResolutionTracker::from_parts(
                snapshot.resolution_list,
                snapshot.current_resolution,
                snapshot.current_side,
            ),
            speech_order,
            question_order,
            history: HistoryLog::from_items(snapshot.history),
            tracking: true,
            path: Some(path),
            store,
        };
        session.recompute();
        session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            competitors: self.competitors.clone(),
            history: self.history.to_vec(),
            speech_recency: self.speech_order.names().to_vec(),
            question_recency: self.question_order.names().to_vec(),
            speech_mode: Some(self.speech_order.mode()),
            question_mode: Some(self.question_order.mode()),
            current_round: Some(self.current_round),
            resolution_list: self.resolutions.titles().to_vec(),
            current_resolution: self.resolutions.current().map(str::to_string),
            current_side: self.resolutions.next_side(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn competitors(&self) -> &[Competitor] {
        &self.competitors
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn resolutions(&self) -> &ResolutionTracker {
        &self.resolutions
    }

    pub fn resolution_state(&self) -> ResolutionState<'_> {
        self.resolutions.state()
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn order(&self, category: Category) -> &RecencyOrder {
        match category {
            Category::Speech => &self.speech_order,
            Category::Question => &self.question_order,
        }
    }

    /// True while the category is still in manual ordering
    pub fn manual_reordering_enabled(&self, category: Category) -> bool {
        self.order(category).is_manual()
    }

    /// Competitors by rank, next up first
    pub fn turn_order(&self, category: Category) -> Vec<&Competitor> {
        let mut list: Vec<&Competitor> = self.competitors.iter().collect();
        list.sort_by_key(|c| c.rank(category));
        list
    }

    /// Case-insensitive lookup
    ///
    /// The full name is tried first; failing that, a trailing side label as
    /// shown in list displays (`"Alice [Aff]"`) is dropped and the rest matched.
    pub fn find_competitor(&self, query: &str) -> Option<&Competitor> {
        self.position(query).map(|i| &self.competitors[i])
    }

    fn position(&self, query: &str) -> Option<usize> {
        self.exact_position(query)
            .or_else(|| strip_side_suffix(query.trim()).and_then(|name| self.exact_position(name)))
    }

    /// Case-insensitive match on the whole trimmed name
    fn exact_position(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.competitors.iter().position(|c| c.is_named(name))
    }

    fn require(&self, query: &str) -> Result<usize> {
        self.position(query)
            .ok_or_else(|| Error::NotFound(format!("competitor '{}'", query.trim())))
    }

    fn require_tracking(&self, action: &str) -> Result<()> {
        if self.tracking {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "cannot {} before tracking has started",
                action
            )))
        }
    }

    fn order_mut(&mut self, category: Category) -> &mut RecencyOrder {
        match category {
            Category::Speech => &mut self.speech_order,
            Category::Question => &mut self.question_order,
        }
    }

    // ------------------------------------------------------------------
    // Derived state and saving
    // ------------------------------------------------------------------

    /// Recompute both rank columns from counts and recency orders
    pub fn recompute(&mut self) {
        assign_ranks(&mut self.competitors, &self.speech_order);
        assign_ranks(&mut self.competitors, &self.question_order);
    }

    /// Save the whole session to its path, if it has one
    pub fn save(&self) -> Persisted {
        let Some(path) = &self.path else {
            return Persisted::NoPath;
        };
        match self.store.save(path, &self.snapshot()) {
            Ok(()) => {
                debug!("Session saved to {}", path.display());
                Persisted::Saved
            }
            Err(e) => {
                warn!("Failed to save session to {}: {}", path.display(), e);
                Persisted::Failed(e)
            }
        }
    }

    fn commit(&mut self) -> Persisted {
        self.recompute();
        self.save()
    }

    // ------------------------------------------------------------------
    // Competitor management
    // ------------------------------------------------------------------

    /// Add a comma-separated list of names, skipping blanks and duplicates
    ///
    /// Returns the names actually added.
    pub fn add_names(&mut self, input: &str) -> (Vec<String>, Persisted) {
        let mut added = Vec::new();
        for name in input.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if self.exact_position(name).is_some() {
                debug!("Skipping duplicate name '{}'", name);
                continue;
            }
            self.insert_competitor(name);
            added.push(name.to_string());
        }
        if added.is_empty() {
            return (added, Persisted::Unchanged);
        }
        (added, self.commit())
    }

    pub fn add_competitor(&mut self, name: &str) -> Result<Persisted> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("competitor name is empty".to_string()));
        }
        if let Some(existing) = self.exact_position(name) {
            return Err(Error::Duplicate(format!(
                "competitor '{}'",
                self.competitors[existing].name
            )));
        }
        self.insert_competitor(name);
        Ok(self.commit())
    }

    fn insert_competitor(&mut self, name: &str) {
        let mut competitor = Competitor::new(name);
        if let Some(title) = self.resolutions.current() {
            competitor.current_side = competitor.side_for_resolution(title);
        }
        self.competitors.push(competitor);
        self.speech_order.push(name);
        self.question_order.push(name);
        info!("Added competitor '{}'", name);
    }

    /// Rename a competitor, carrying recency positions and history along
    pub fn rename_competitor(&mut self, old: &str, new: &str) -> Result<Persisted> {
        let index = self.require(old)?;
        let new = new.trim();
        if new.is_empty() {
            return Err(Error::InvalidInput("competitor name is empty".to_string()));
        }
        if let Some(other) = self.exact_position(new) {
            if other != index {
                return Err(Error::Duplicate(format!("competitor '{}'", self.competitors[other].name)));
            }
        }

        let old_name = std::mem::replace(&mut self.competitors[index].name, new.to_string());
        self.speech_order.rename(&old_name, new);
        self.question_order.rename(&old_name, new);
        self.history.rename(&old_name, new);
        info!("Renamed competitor '{}' to '{}'", old_name, new);
        Ok(self.commit())
    }

    /// Remove a competitor; history entries naming them are kept
    pub fn delete_competitor(&mut self, name: &str) -> Result<Persisted> {
        let index = self.require(name)?;
        let removed = self.competitors.remove(index);
        self.speech_order.remove(&removed.name);
        self.question_order.remove(&removed.name);
        info!("Deleted competitor '{}'", removed.name);
        Ok(self.commit())
    }

    pub fn set_general_notes(&mut self, name: &str, text: &str) -> Result<Persisted> {
        let index = self.require(name)?;
        self.competitors[index].notes.general = text.to_string();
        Ok(self.commit())
    }

    /// Begin tracking, saving to `path`
    pub fn start_tracking(&mut self, path: PathBuf) -> Result<Persisted> {
        if self.competitors.is_empty() {
            return Err(Error::InvalidState("add competitors before starting".to_string()));
        }
        info!("Tracking started; session file {}", path.display());
        self.path = Some(path);
        self.tracking = true;
        Ok(self.commit())
    }

    /// Begin tracking with a fresh numbered file in `folder`
    pub fn start_tracking_in(&mut self, folder: &Path) -> Result<Persisted> {
        if self.competitors.is_empty() {
            return Err(Error::InvalidState("add competitors before starting".to_string()));
        }
        self.start_tracking(unique_session_path(folder))
    }

    // ------------------------------------------------------------------
    // Logging actions
    // ------------------------------------------------------------------

    /// Record a speech and advance the round
    ///
    /// With a resolution active the speaker keeps the side already set for
    /// it; otherwise the session's next side is used. The next side then
    /// alternates.
    pub fn log_speech(&mut self, name: &str, duration_secs: u64) -> Result<Persisted> {
        self.require_tracking("log a speech")?;
        let index = self.require(name)?;

        let resolution = self.resolutions.current().map(str::to_string);
        let side = match (&resolution, self.competitors[index].current_side) {
            (Some(_), Some(side)) => side,
            _ => self.resolutions.next_side(),
        };
        let round = self.current_round;

        let competitor = &mut self.competitors[index];
        let old_count = competitor.speech_count;
        competitor.add_speech(round, Some(side), duration_secs, resolution.as_deref().unwrap_or(""));
        if let Some(title) = &resolution {
            competitor.remember_side(title, side);
        }
        let new_count = competitor.speech_count;
        let name = competitor.name.clone();

        self.resolutions.toggle_side();
        self.current_round += 1;
        self.competitors[index].last_speech_round = self.current_round;
        self.history
            .push(HistoryItem::new(Category::Speech, &name, old_count, new_count));
        self.speech_order.enter_automatic();
        self.speech_order.move_to_back(&name);

        info!(
            "Speech logged for '{}' ({}, {}s), round now {}",
            name,
            side.abbrev(),
            duration_secs,
            self.current_round
        );
        Ok(self.commit())
    }

    /// Record a question and advance the round
    pub fn log_question(&mut self, name: &str) -> Result<Persisted> {
        self.require_tracking("log a question")?;
        let index = self.require(name)?;
        let round = self.current_round;

        let competitor = &mut self.competitors[index];
        let old_count = competitor.question_count;
        competitor.add_question(round);
        let new_count = competitor.question_count;
        let name = competitor.name.clone();

        self.current_round += 1;
        self.competitors[index].last_question_round = self.current_round;
        self.history
            .push(HistoryItem::new(Category::Question, &name, old_count, new_count));
        self.question_order.enter_automatic();
        self.question_order.move_to_back(&name);

        info!("Question logged for '{}', round now {}", name, self.current_round);
        Ok(self.commit())
    }

    /// Put a competitor's count back to the entry's old value
    ///
    /// The last-round marker becomes 0 for a zero count and otherwise
    /// `current_round - 1`, an approximation. The round counter and the
    /// speech/question records are left as they are.
    pub fn restore_history_item(&mut self, item: &HistoryItem) -> Result<Persisted> {
        self.require_tracking("restore a history entry")?;
        let index = self.require(&item.competitor_name)?;
        let category = item.action_type;
        let last_round = if item.old_value == 0 {
            0
        } else {
            self.current_round.saturating_sub(1)
        };

        let competitor = &mut self.competitors[index];
        competitor.set_count(category, item.old_value);
        competitor.set_last_round(category, last_round);
        info!(
            "Restored {}'s {} count to {}",
            competitor.name, category, item.old_value
        );
        Ok(self.commit())
    }

    /// Restore the history entry at `index` (0 = oldest retained)
    pub fn restore_history_index(&mut self, index: usize) -> Result<Persisted> {
        let item = self
            .history
            .get(index)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("history entry {}", index)))?;
        self.restore_history_item(&item)
    }

    /// Swap a competitor with its neighbour in a manual-mode order
    ///
    /// Unknown names and edge positions change nothing and are not errors.
    pub fn move_competitor(
        &mut self,
        name: &str,
        direction: Direction,
        category: Category,
    ) -> Result<Persisted> {
        let canonical = match self.find_competitor(name) {
            Some(c) => c.name.clone(),
            None => name.trim().to_string(),
        };
        match self.order_mut(category).move_competitor(&canonical, direction)? {
            MoveOutcome::Moved => Ok(self.commit()),
            MoveOutcome::AtEdge | MoveOutcome::NotListed => Ok(Persisted::Unchanged),
        }
    }

    // ------------------------------------------------------------------
    // Resolutions and sides
    // ------------------------------------------------------------------

    fn apply_transition(&mut self, transition: Transition) -> Persisted {
        restore_sides(&mut self.competitors, &transition);
        self.commit()
    }

    pub fn add_resolution(&mut self, title: &str) -> Result<Persisted> {
        let transition = self.resolutions.add(title)?;
        Ok(self.apply_transition(transition))
    }

    pub fn remove_resolution(&mut self, title: &str) -> Result<Persisted> {
        let transition = self.resolutions.remove(title.trim())?;
        Ok(self.apply_transition(transition))
    }

    /// Cycle to the next resolution; no-op without resolutions
    pub fn advance_resolution(&mut self) -> Persisted {
        match self.resolutions.advance() {
            Transition::Unchanged => Persisted::Unchanged,
            transition => self.apply_transition(transition),
        }
    }

    pub fn select_resolution(&mut self, title: &str) -> Result<Persisted> {
        let transition = self.resolutions.select(title.trim())?;
        Ok(self.apply_transition(transition))
    }

    /// Assign a competitor's side on a resolution (the active one by default)
    pub fn set_competitor_side(
        &mut self,
        name: &str,
        resolution: Option<&str>,
        side: Side,
    ) -> Result<Persisted> {
        let index = self.require(name)?;
        let title = match resolution.map(str::trim) {
            Some(title) if self.resolutions.contains(title) => title.to_string(),
            Some(title) => return Err(Error::NotFound(format!("resolution '{}'", title))),
            None => self
                .resolutions
                .current()
                .map(str::to_string)
                .ok_or_else(|| Error::InvalidState("no active resolution".to_string()))?,
        };

        let is_current = self.resolutions.current() == Some(title.as_str());
        let competitor = &mut self.competitors[index];
        competitor.remember_side(&title, side);
        if is_current {
            competitor.current_side = Some(side);
        }
        debug!("'{}' set to {} on '{}'", competitor.name, side.abbrev(), title);
        Ok(self.commit())
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    /// Drop all session state and delete the session files
    ///
    /// `Saved` here means the files were removed.
    pub fn clear_session(&mut self) -> Persisted {
        let outcome = match self.path.take() {
            Some(path) => match self.store.clear(&path) {
                Ok(()) => {
                    info!("Cleared session files for {}", path.display());
                    Persisted::Saved
                }
                Err(e) => {
                    warn!("Failed to clear session files for {}: {}", path.display(), e);
                    Persisted::Failed(e)
                }
            },
            None => Persisted::NoPath,
        };

        self.competitors.clear();
        self.current_round = 0;
        self.resolutions = ResolutionTracker::new();
        self.speech_order = RecencyOrder::new(Category::Speech);
        self.question_order = RecencyOrder::new(Category::Question);
        self.history.clear();
        self.tracking = false;
        outcome
    }
}

/// `"Alice [Aff]"` -> `"Alice"`; `None` unless the query ends in a side label
fn strip_side_suffix(query: &str) -> Option<&str> {
    let (name, label) = query.strip_suffix(']')?.rsplit_once('[')?;
    Side::parse_label(label)?;
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

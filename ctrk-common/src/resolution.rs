//! Resolution / side state machine
//!
//! Tracks the ordered list of debate resolutions, which one is active, and
//! the side the next speaker takes. Every entry into a resolution (adding the
//! first one, removing the active one, advancing, or direct selection) starts
//! that resolution on the Affirmative side.

use tracing::{debug, info};

use crate::model::{Competitor, Side};
use crate::{Error, Result};

/// Observable state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState<'a> {
    NoResolution,
    Active { title: &'a str, side: Side },
}

/// Effect of an operation on the active resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Active resolution unchanged
    Unchanged,
    /// A resolution was entered (possibly the same one again)
    Entered(String),
    /// No resolution remains active
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionTracker {
    titles: Vec<String>,
    current: Option<String>,
    next_side: Side,
}

impl Default for ResolutionTracker {
    fn default() -> Self {
        Self {
            titles: Vec::new(),
            current: None,
            next_side: Side::Affirmative,
        }
    }
}

impl ResolutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild persisted state, dropping duplicate titles
    ///
    /// A current title that is not in the list falls back to the first title.
    pub fn from_parts(titles: Vec<String>, current: Option<String>, next_side: Side) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(titles.len());
        for t in titles {
            let t = t.trim().to_string();
            if !t.is_empty() && !unique.contains(&t) {
                unique.push(t);
            }
        }
        let current = match current {
            Some(c) if unique.contains(&c) => Some(c),
            _ => unique.first().cloned(),
        };
        let next_side = if current.is_some() { next_side } else { Side::Affirmative };
        Self {
            titles: unique,
            current,
            next_side,
        }
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Side the next speaker defaults to
    pub fn next_side(&self) -> Side {
        self.next_side
    }

    pub fn state(&self) -> ResolutionState<'_> {
        match &self.current {
            Some(title) => ResolutionState::Active {
                title: title.as_str(),
                side: self.next_side,
            },
            None => ResolutionState::NoResolution,
        }
    }

    /// Append a resolution; the first one added becomes active
    pub fn add(&mut self, title: &str) -> Result<Transition> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("resolution title is empty".to_string()));
        }
        if self.titles.iter().any(|t| t == title) {
            return Err(Error::Duplicate(format!("resolution '{}'", title)));
        }
        self.titles.push(title.to_string());
        info!("Added resolution '{}'", title);

        if self.current.is_none() {
            Ok(self.enter(title.to_string()))
        } else {
            Ok(Transition::Unchanged)
        }
    }

    /// Remove a resolution; removing the active one moves to the new first
    /// title, or to no resolution when the list empties
    pub fn remove(&mut self, title: &str) -> Result<Transition> {
        let index = self
            .titles
            .iter()
            .position(|t| t == title)
            .ok_or_else(|| Error::NotFound(format!("resolution '{}'", title)))?;
        self.titles.remove(index);
        info!("Removed resolution '{}'", title);

        if self.current.as_deref() != Some(title) {
            return Ok(Transition::Unchanged);
        }
        match self.titles.first().cloned() {
            Some(next) => Ok(self.enter(next)),
            None => {
                self.current = None;
                self.next_side = Side::Affirmative;
                debug!("No resolution active");
                Ok(Transition::Cleared)
            }
        }
    }

    /// Move cyclically to the next resolution; no-op on an empty list
    pub fn advance(&mut self) -> Transition {
        if self.titles.is_empty() {
            return Transition::Unchanged;
        }
        let next_index = match self
            .current
            .as_ref()
            .and_then(|c| self.titles.iter().position(|t| t == c))
        {
            Some(i) => (i + 1) % self.titles.len(),
            None => 0,
        };
        let next = self.titles[next_index].clone();
        self.enter(next)
    }

    /// Make a listed resolution active
    pub fn select(&mut self, title: &str) -> Result<Transition> {
        if !self.titles.iter().any(|t| t == title) {
            return Err(Error::NotFound(format!("resolution '{}'", title)));
        }
        Ok(self.enter(title.to_string()))
    }

    /// Alternate the next speaker's side after a speech
    pub fn toggle_side(&mut self) {
        self.next_side = self.next_side.toggled();
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles.iter().any(|t| t == title)
    }

    fn enter(&mut self, title: String) -> Transition {
        info!("Resolution now '{}' (Affirmative opens)", title);
        self.current = Some(title.clone());
        self.next_side = Side::Affirmative;
        Transition::Entered(title)
    }
}

/// Apply a transition to every competitor's current side
///
/// Entering a resolution restores each competitor's remembered side for it
/// (falling back to their speech records); clearing removes all sides.
pub fn restore_sides(competitors: &mut [Competitor], transition: &Transition) {
    match transition {
        Transition::Unchanged => {}
        Transition::Entered(title) => {
            for c in competitors.iter_mut() {
                c.current_side = c.side_for_resolution(title);
            }
        }
        Transition::Cleared => {
            for c in competitors.iter_mut() {
                c.current_side = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(titles: &[&str]) -> ResolutionTracker {
        let mut t = ResolutionTracker::new();
        for title in titles {
            t.add(title).unwrap();
        }
        t
    }

    #[test]
    fn test_first_add_activates_on_affirmative() {
        let mut t = ResolutionTracker::new();
        assert_eq!(t.state(), ResolutionState::NoResolution);
        assert_eq!(t.add("Topic A").unwrap(), Transition::Entered("Topic A".into()));
        assert_eq!(
            t.state(),
            ResolutionState::Active { title: "Topic A", side: Side::Affirmative }
        );
        assert_eq!(t.add("Topic B").unwrap(), Transition::Unchanged);
        assert_eq!(t.current(), Some("Topic A"));
    }

    #[test]
    fn test_duplicate_add_rejected_without_change() {
        let mut t = tracker(&["Topic A"]);
        assert!(matches!(t.add("Topic A"), Err(Error::Duplicate(_))));
        assert_eq!(t.titles().len(), 1);
        // exact match only
        assert!(t.add("topic a").is_ok());
    }

    #[test]
    fn test_blank_add_rejected() {
        let mut t = ResolutionTracker::new();
        assert!(matches!(t.add("   "), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_remove_active_moves_to_first() {
        let mut t = tracker(&["A", "B", "C"]);
        t.select("B").unwrap();
        t.toggle_side();
        assert_eq!(t.remove("B").unwrap(), Transition::Entered("A".into()));
        assert_eq!(t.next_side(), Side::Affirmative);
    }

    #[test]
    fn test_remove_inactive_keeps_state() {
        let mut t = tracker(&["A", "B"]);
        t.toggle_side();
        assert_eq!(t.remove("B").unwrap(), Transition::Unchanged);
        assert_eq!(t.next_side(), Side::Negative);
    }

    #[test]
    fn test_remove_last_clears() {
        let mut t = tracker(&["A"]);
        assert_eq!(t.remove("A").unwrap(), Transition::Cleared);
        assert_eq!(t.state(), ResolutionState::NoResolution);
        assert!(matches!(t.remove("A"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_advance_cycles_and_resets_side() {
        let mut t = tracker(&["A", "B", "C"]);
        for expected in ["B", "C", "A"] {
            t.toggle_side();
            assert_eq!(t.advance(), Transition::Entered(expected.into()));
            assert_eq!(t.next_side(), Side::Affirmative);
        }
        assert_eq!(t.current(), Some("A"));
    }

    #[test]
    fn test_advance_empty_is_noop() {
        let mut t = ResolutionTracker::new();
        assert_eq!(t.advance(), Transition::Unchanged);
        assert_eq!(t.state(), ResolutionState::NoResolution);
    }

    #[test]
    fn test_from_parts_normalises() {
        let t = ResolutionTracker::from_parts(
            vec!["A".into(), "B".into(), "A".into(), " ".into()],
            Some("Missing".into()),
            Side::Negative,
        );
        assert_eq!(t.titles(), &["A".to_string(), "B".to_string()]);
        assert_eq!(t.current(), Some("A"));

        let t = ResolutionTracker::from_parts(vec!["A".into(), "B".into()], Some("B".into()), Side::Negative);
        assert_eq!(t.state(), ResolutionState::Active { title: "B", side: Side::Negative });
    }

    #[test]
    fn test_restore_sides_on_entry_and_clear() {
        let mut competitors = vec![Competitor::new("Alice"), Competitor::new("Bob")];
        competitors[0].remember_side("A", Side::Negative);
        competitors[1].add_speech(0, Some(Side::Affirmative), 0, "A");
        competitors[1].current_side = Some(Side::Negative);

        restore_sides(&mut competitors, &Transition::Entered("A".into()));
        assert_eq!(competitors[0].current_side, Some(Side::Negative));
        assert_eq!(competitors[1].current_side, Some(Side::Affirmative));

        restore_sides(&mut competitors, &Transition::Entered("B".into()));
        assert_eq!(competitors[0].current_side, None);

        competitors[0].current_side = Some(Side::Affirmative);
        restore_sides(&mut competitors, &Transition::Cleared);
        assert!(competitors.iter().all(|c| c.current_side.is_none()));
    }
}

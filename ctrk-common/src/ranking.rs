//! Recency & rank engine
//!
//! Decides who speaks or asks next. Each category keeps a recency order of
//! competitor names and an [`OrderingMode`]:
//!
//! - **Manual**: before anything has been logged in the category the organiser
//!   controls the order directly (e.g. seating order) and ranks follow it.
//! - **Automatic**: after the first logged action, competitors are grouped by
//!   count (fewest first) and ordered inside each group by their recency
//!   position. The switch is one-way for the rest of the session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::model::{Category, Competitor};
use crate::{Error, Result};

/// Per-category ordering regime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderingMode {
    Manual,
    Automatic,
}

impl OrderingMode {
    /// Mode implied by counts alone: manual until anyone has a nonzero count
    pub fn derive(competitors: &[Competitor], category: Category) -> OrderingMode {
        if competitors.iter().all(|c| c.count(category) == 0) {
            OrderingMode::Manual
        } else {
            OrderingMode::Automatic
        }
    }
}

/// Drag direction for manual reordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards the front (-1)
    Up,
    /// Towards the back (+1)
    Down,
}

impl Direction {
    /// Map a signed step (-1 / +1) to a direction
    pub fn from_step(step: i32) -> Option<Direction> {
        match step {
            -1 => Some(Direction::Up),
            1 => Some(Direction::Down),
            _ => None,
        }
    }
}

/// Result of a manual move request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    /// Already first (moving up) or last (moving down)
    AtEdge,
    /// Name not present in the order
    NotListed,
}

/// Recency order and ordering mode for one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecencyOrder {
    category: Category,
    names: Vec<String>,
    mode: OrderingMode,
}

impl RecencyOrder {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            names: Vec::new(),
            mode: OrderingMode::Manual,
        }
    }

    pub fn with_names(category: Category, names: Vec<String>, mode: OrderingMode) -> Self {
        Self { category, names, mode }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn mode(&self) -> OrderingMode {
        self.mode
    }

    pub fn is_manual(&self) -> bool {
        self.mode == OrderingMode::Manual
    }

    /// Leave manual mode for good; repeated calls are no-ops
    pub fn enter_automatic(&mut self) {
        if self.mode == OrderingMode::Manual {
            debug!("{} ordering switched to automatic", self.category);
            self.mode = OrderingMode::Automatic;
        }
    }

    /// Append a name unless already listed
    pub fn push(&mut self, name: &str) {
        if !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_string());
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.names.retain(|n| n != name);
    }

    pub fn rename(&mut self, old: &str, new: &str) {
        for n in self.names.iter_mut().filter(|n| n.as_str() == old) {
            *n = new.to_string();
        }
    }

    /// Move a name to the back, marking it as the most recent actor
    pub fn move_to_back(&mut self, name: &str) {
        self.remove(name);
        self.names.push(name.to_string());
    }

    /// Make sure every competitor is listed, appending unknown names in
    /// competitor order and dropping names that no longer exist
    pub fn reconcile(&mut self, competitors: &[Competitor]) {
        let before = self.names.len();
        let mut seen = std::collections::HashSet::new();
        self.names
            .retain(|n| competitors.iter().any(|c| &c.name == n) && seen.insert(n.clone()));
        if self.names.len() != before {
            warn!(
                "Dropped {} stale or duplicate names from {} order",
                before - self.names.len(),
                self.category
            );
        }
        for c in competitors {
            self.push(&c.name);
        }
    }

    /// Swap `name` with its neighbour in `direction`
    ///
    /// Only valid in manual mode. Unknown names and edge positions are
    /// reported through [`MoveOutcome`] rather than as errors, since the UI
    /// may race with list updates.
    pub fn move_competitor(&mut self, name: &str, direction: Direction) -> Result<MoveOutcome> {
        if !self.is_manual() {
            return Err(Error::InvalidState(format!(
                "{} order is automatic once activity has been logged",
                self.category
            )));
        }

        let Some(index) = self.names.iter().position(|n| n == name) else {
            warn!("Cannot move '{}': not in {} order", name, self.category);
            return Ok(MoveOutcome::NotListed);
        };

        let target = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < self.names.len() => index + 1,
            _ => {
                debug!("'{}' already at edge of {} order", name, self.category);
                return Ok(MoveOutcome::AtEdge);
            }
        };

        self.names.swap(index, target);
        Ok(MoveOutcome::Moved)
    }
}

/// Turn order as indices into `competitors`
///
/// Manual mode follows `recency` exactly (filtered to known names), with any
/// unlisted competitors after it in insertion order. Automatic mode groups by
/// ascending count and orders each group by recency position, unlisted names
/// last. Both sorts are stable, so ties never depend on anything but input
/// order.
pub fn compute_order(
    competitors: &[Competitor],
    category: Category,
    recency: &[String],
    mode: OrderingMode,
) -> Vec<usize> {
    let mut position: HashMap<&str, usize> = HashMap::with_capacity(recency.len());
    for (pos, name) in recency.iter().enumerate() {
        position.entry(name.as_str()).or_insert(pos);
    }
    let slot = |i: &usize| {
        position
            .get(competitors[*i].name.as_str())
            .copied()
            .unwrap_or(usize::MAX)
    };

    let mut order: Vec<usize> = (0..competitors.len()).collect();
    match mode {
        OrderingMode::Manual => order.sort_by_key(slot),
        OrderingMode::Automatic => {
            order.sort_by_key(|i| (competitors[*i].count(category), slot(i)))
        }
    }
    order
}

/// Recompute and store ranks for one category; returns names in turn order
pub fn assign_ranks(competitors: &mut [Competitor], order: &RecencyOrder) -> Vec<String> {
    let category = order.category();
    let indices = compute_order(competitors, category, order.names(), order.mode());
    let mut names = Vec::with_capacity(indices.len());
    for (rank, index) in indices.into_iter().enumerate() {
        competitors[index].set_rank(category, rank as u32 + 1);
        names.push(competitors[index].name.clone());
    }
    debug!("Recomputed {} ranks ({:?}): {:?}", category, order.mode(), names);
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(names: &[&str]) -> Vec<Competitor> {
        names.iter().map(|n| Competitor::new(*n)).collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn ordered<'a>(competitors: &'a [Competitor], indices: &[usize]) -> Vec<&'a str> {
        indices.iter().map(|i| competitors[*i].name.as_str()).collect()
    }

    #[test]
    fn test_manual_mode_follows_recency_exactly() {
        let competitors = roster(&["Alice", "Bob", "Carol"]);
        let recency = names(&["Carol", "Alice", "Bob"]);
        let order = compute_order(&competitors, Category::Speech, &recency, OrderingMode::Manual);
        assert_eq!(ordered(&competitors, &order), vec!["Carol", "Alice", "Bob"]);
    }

    #[test]
    fn test_manual_mode_ignores_counts() {
        let mut competitors = roster(&["Alice", "Bob"]);
        competitors[0].speech_count = 5;
        let recency = names(&["Alice", "Bob"]);
        let order = compute_order(&competitors, Category::Speech, &recency, OrderingMode::Manual);
        assert_eq!(ordered(&competitors, &order), vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_manual_mode_filters_unknown_and_appends_unlisted() {
        let competitors = roster(&["Alice", "Bob", "Carol"]);
        let recency = names(&["Ghost", "Bob", "Alice"]);
        let order = compute_order(&competitors, Category::Speech, &recency, OrderingMode::Manual);
        assert_eq!(ordered(&competitors, &order), vec!["Bob", "Alice", "Carol"]);
    }

    #[test]
    fn test_automatic_mode_groups_by_count_then_recency() {
        let mut competitors = roster(&["Alice", "Bob", "Carol", "Dan"]);
        competitors[0].speech_count = 1;
        competitors[2].speech_count = 1;
        let recency = names(&["Dan", "Bob", "Carol", "Alice"]);
        let order = compute_order(&competitors, Category::Speech, &recency, OrderingMode::Automatic);
        assert_eq!(ordered(&competitors, &order), vec!["Dan", "Bob", "Carol", "Alice"]);

        let recency = names(&["Alice", "Carol", "Bob", "Dan"]);
        let order = compute_order(&competitors, Category::Speech, &recency, OrderingMode::Automatic);
        assert_eq!(ordered(&competitors, &order), vec!["Bob", "Dan", "Alice", "Carol"]);
    }

    #[test]
    fn test_automatic_mode_lower_count_always_first() {
        let mut competitors = roster(&["Alice", "Bob", "Carol"]);
        competitors[0].question_count = 3;
        competitors[1].question_count = 1;
        competitors[2].question_count = 2;
        let recency = names(&["Alice", "Carol", "Bob"]);
        let order =
            compute_order(&competitors, Category::Question, &recency, OrderingMode::Automatic);
        assert_eq!(ordered(&competitors, &order), vec!["Bob", "Carol", "Alice"]);
    }

    #[test]
    fn test_unlisted_ties_keep_insertion_order() {
        let competitors = roster(&["Alice", "Bob", "Carol"]);
        let order = compute_order(&competitors, Category::Speech, &[], OrderingMode::Automatic);
        assert_eq!(ordered(&competitors, &order), vec!["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn test_assign_ranks_is_contiguous_permutation() {
        let mut competitors = roster(&["Alice", "Bob", "Carol", "Dan", "Eve"]);
        competitors[1].speech_count = 2;
        competitors[3].speech_count = 1;
        let order = RecencyOrder::with_names(
            Category::Speech,
            names(&["Eve", "Dan", "Carol"]),
            OrderingMode::Automatic,
        );
        assign_ranks(&mut competitors, &order);
        let mut ranks: Vec<u32> = competitors.iter().map(|c| c.speech_rank).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_assign_ranks_only_touches_its_category() {
        let mut competitors = roster(&["Alice", "Bob"]);
        let order = RecencyOrder::with_names(
            Category::Question,
            names(&["Bob", "Alice"]),
            OrderingMode::Manual,
        );
        let turn = assign_ranks(&mut competitors, &order);
        assert_eq!(turn, names(&["Bob", "Alice"]));
        assert_eq!(competitors[1].question_rank, 1);
        assert_eq!(competitors[0].speech_rank, 0);
    }

    #[test]
    fn test_move_up_and_down() {
        let mut order =
            RecencyOrder::with_names(Category::Speech, names(&["Alice", "Bob", "Carol"]), OrderingMode::Manual);
        assert_eq!(order.move_competitor("Carol", Direction::Up).unwrap(), MoveOutcome::Moved);
        assert_eq!(order.names(), names(&["Alice", "Carol", "Bob"]).as_slice());
        assert_eq!(order.move_competitor("Alice", Direction::Down).unwrap(), MoveOutcome::Moved);
        assert_eq!(order.names(), names(&["Carol", "Alice", "Bob"]).as_slice());
    }

    #[test]
    fn test_move_at_edges_is_noop() {
        let mut order =
            RecencyOrder::with_names(Category::Speech, names(&["Alice", "Bob"]), OrderingMode::Manual);
        assert_eq!(order.move_competitor("Alice", Direction::Up).unwrap(), MoveOutcome::AtEdge);
        assert_eq!(order.move_competitor("Bob", Direction::Down).unwrap(), MoveOutcome::AtEdge);
        assert_eq!(order.names(), names(&["Alice", "Bob"]).as_slice());
    }

    #[test]
    fn test_move_unknown_name_is_silent() {
        let mut order = RecencyOrder::with_names(Category::Speech, names(&["Alice"]), OrderingMode::Manual);
        assert_eq!(order.move_competitor("Zed", Direction::Up).unwrap(), MoveOutcome::NotListed);
    }

    #[test]
    fn test_move_rejected_in_automatic_mode() {
        let mut order =
            RecencyOrder::with_names(Category::Speech, names(&["Alice", "Bob"]), OrderingMode::Manual);
        order.enter_automatic();
        order.enter_automatic();
        assert_eq!(order.mode(), OrderingMode::Automatic);
        assert!(matches!(
            order.move_competitor("Bob", Direction::Up),
            Err(Error::InvalidState(_))
        ));
        assert_eq!(order.names(), names(&["Alice", "Bob"]).as_slice());
    }

    #[test]
    fn test_reconcile_adds_missing_and_drops_stale() {
        let competitors = roster(&["Alice", "Bob", "Carol"]);
        let mut order = RecencyOrder::with_names(
            Category::Speech,
            names(&["Bob", "Ghost", "Bob"]),
            OrderingMode::Manual,
        );
        order.reconcile(&competitors);
        assert_eq!(order.names(), names(&["Bob", "Alice", "Carol"]).as_slice());
    }

    #[test]
    fn test_move_to_back() {
        let mut order =
            RecencyOrder::with_names(Category::Speech, names(&["Alice", "Bob", "Carol"]), OrderingMode::Manual);
        order.move_to_back("Alice");
        assert_eq!(order.names(), names(&["Bob", "Carol", "Alice"]).as_slice());
    }

    #[test]
    fn test_derive_mode_from_counts() {
        let mut competitors = roster(&["Alice", "Bob"]);
        assert_eq!(OrderingMode::derive(&competitors, Category::Speech), OrderingMode::Manual);
        competitors[1].speech_count = 1;
        assert_eq!(OrderingMode::derive(&competitors, Category::Speech), OrderingMode::Automatic);
        assert_eq!(OrderingMode::derive(&competitors, Category::Question), OrderingMode::Manual);
    }

    #[test]
    fn test_direction_from_step() {
        assert_eq!(Direction::from_step(-1), Some(Direction::Up));
        assert_eq!(Direction::from_step(1), Some(Direction::Down));
        assert_eq!(Direction::from_step(0), None);
    }
}

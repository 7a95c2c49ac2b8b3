//! # Congress Tracker Common Library
//!
//! Session engine shared by the congress tracker front ends:
//! - Competitor, speech and question records
//! - Recency-driven turn ordering and rank assignment
//! - Resolution and side tracking
//! - Session controller and CSV/JSON persistence
//! - Configuration loading
//! - Statistics and the speech timer

pub mod config;
pub mod error;
pub mod model;
pub mod persistence;
pub mod ranking;
pub mod resolution;
pub mod session;
pub mod stats;
pub mod time;
pub mod timer;

pub use error::{Error, Result};
pub use model::{Category, Competitor, HistoryItem, Side};
pub use persistence::{CsvStore, SessionSnapshot, SessionStore};
pub use ranking::{Direction, OrderingMode};
pub use session::{Persisted, Session};

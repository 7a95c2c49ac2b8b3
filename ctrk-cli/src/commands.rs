//! Command handlers
//!
//! Each handler loads the session, applies one action through the session
//! controller and prints the result.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use ctrk_common::config::{
    config_file_path, latest_session_path, write_toml_config, TimerMode, TomlConfig,
};
use ctrk_common::resolution::ResolutionState;
use ctrk_common::stats::{resolution_stats, ResolutionFilter, SessionStatus};
use ctrk_common::timer::SpeechTimer;
use ctrk_common::{Category, Direction, Persisted, Session, Side};
use tracing::{info, warn};

use crate::ResolutionAction;

/// Resolved locations and settings shared by every command
pub struct AppContext {
    data_folder: PathBuf,
    session_arg: Option<PathBuf>,
    config_arg: Option<PathBuf>,
    config: TomlConfig,
}

impl AppContext {
    pub fn new(
        data_folder: PathBuf,
        session_arg: Option<PathBuf>,
        config_arg: Option<PathBuf>,
        config: TomlConfig,
    ) -> Self {
        Self {
            data_folder,
            session_arg,
            config_arg,
            config,
        }
    }

    fn session_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.session_arg {
            return Ok(path.clone());
        }
        latest_session_path(&self.data_folder).ok_or_else(|| {
            anyhow!(
                "No session found in {} (run `ctrk start <names>` first)",
                self.data_folder.display()
            )
        })
    }

    fn open(&self) -> Result<Session> {
        let path = self.session_path()?;
        Session::open(&path).with_context(|| format!("Failed to load session {}", path.display()))
    }
}

fn report(outcome: Persisted) {
    match outcome {
        Persisted::Failed(e) => {
            eprintln!("Warning: change applied but not saved: {}", e);
        }
        Persisted::Unchanged => println!("Nothing changed."),
        Persisted::Saved | Persisted::NoPath => {}
    }
}

pub fn start(ctx: &AppContext, names: &str) -> Result<()> {
    let mut session = Session::new();
    let (added, _) = session.add_names(names);
    if added.is_empty() {
        bail!("No competitor names given");
    }

    let outcome = match &ctx.session_arg {
        Some(path) => {
            if path.exists() {
                bail!("{} already exists; use `ctrk add` to extend it", path.display());
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            session.start_tracking(path.clone())?
        }
        None => {
            std::fs::create_dir_all(&ctx.data_folder)
                .with_context(|| format!("Failed to create {}", ctx.data_folder.display()))?;
            session.start_tracking_in(&ctx.data_folder)?
        }
    };
    if let Some(e) = outcome.warning() {
        bail!("Session could not be saved: {}", e);
    }

    let path = session.path().map(Path::display);
    info!("Started session with {} competitors", added.len());
    if let Some(path) = path {
        println!("Tracking {} competitors in {}", added.len(), path);
    }
    print_order(&session, Category::Speech);
    Ok(())
}

pub fn add(ctx: &AppContext, names: &str) -> Result<()> {
    let mut session = ctx.open()?;
    let (added, outcome) = session.add_names(names);
    if added.is_empty() {
        println!("No new names (blank or already listed).");
        return Ok(());
    }
    report(outcome);
    println!("Added: {}", added.join(", "));
    Ok(())
}

pub fn rename(ctx: &AppContext, old: &str, new: &str) -> Result<()> {
    let mut session = ctx.open()?;
    report(session.rename_competitor(old, new)?);
    println!("Renamed {} to {}", old, new.trim());
    Ok(())
}

pub fn remove(ctx: &AppContext, name: &str) -> Result<()> {
    let mut session = ctx.open()?;
    report(session.delete_competitor(name)?);
    println!("Removed {}", name.trim());
    Ok(())
}

/// Speech length as `M:SS`, `MM:SS` or plain seconds
pub fn parse_duration(text: &str) -> Result<u64> {
    let text = text.trim();
    match text.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u64 = minutes
                .trim()
                .parse()
                .with_context(|| format!("Invalid minutes in '{}'", text))?;
            let seconds: u64 = seconds
                .trim()
                .parse()
                .with_context(|| format!("Invalid seconds in '{}'", text))?;
            if seconds >= 60 {
                bail!("Seconds must be below 60 in '{}'", text);
            }
            minutes
                .checked_mul(60)
                .and_then(|secs| secs.checked_add(seconds))
                .ok_or_else(|| anyhow!("Speech time '{}' is too long", text))
        }
        None => text
            .parse()
            .with_context(|| format!("Invalid speech time '{}'", text)),
    }
}

pub fn speech(ctx: &AppContext, name: &str, time: Option<&str>) -> Result<()> {
    let duration = time.map(parse_duration).transpose()?.unwrap_or(0);
    let mut session = ctx.open()?;
    report(session.log_speech(name, duration)?);

    if let Some(c) = session.find_competitor(name) {
        let side = c.current_side.map(|s| format!(" ({})", s.long_name())).unwrap_or_default();
        println!("{} spoke{}; speeches: {}", c.name, side, c.speech_count);
    }
    if let ResolutionState::Active { title, side } = session.resolution_state() {
        println!("Next side on '{}': {}", title, side.long_name());
    }
    print_order(&session, Category::Speech);
    Ok(())
}

pub fn question(ctx: &AppContext, name: &str) -> Result<()> {
    let mut session = ctx.open()?;
    report(session.log_question(name)?);
    if let Some(c) = session.find_competitor(name) {
        println!("{} asked; questions: {}", c.name, c.question_count);
    }
    print_order(&session, Category::Question);
    Ok(())
}

fn print_order(session: &Session, category: Category) {
    let show_side = category == Category::Speech
        && matches!(session.resolution_state(), ResolutionState::Active { .. });
    let mode = if session.manual_reordering_enabled(category) {
        "manual"
    } else {
        "automatic"
    };
    println!("{} order ({}):", category_title(category), mode);
    for competitor in session.turn_order(category) {
        println!("  {}", competitor.display_line(category, show_side));
    }
}

fn category_title(category: Category) -> &'static str {
    match category {
        Category::Speech => "Speech",
        Category::Question => "Question",
    }
}

pub fn order(ctx: &AppContext, category: Option<Category>, json: bool) -> Result<()> {
    let session = ctx.open()?;
    let categories: Vec<Category> = match category {
        Some(c) => vec![c],
        None => Category::ALL.to_vec(),
    };

    if json {
        let mut out = serde_json::Map::new();
        for category in categories {
            let rows: Vec<serde_json::Value> = session
                .turn_order(category)
                .into_iter()
                .map(|c| {
                    serde_json::json!({
                        "name": c.name,
                        "rank": c.rank(category),
                        "count": c.count(category),
                        "side": c.current_side.map(|s| s.abbrev()),
                    })
                })
                .collect();
            out.insert(category.as_str().to_string(), serde_json::Value::Array(rows));
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Round {}", session.current_round());
    for category in categories {
        print_order(&session, category);
    }
    Ok(())
}

pub fn move_competitor(
    ctx: &AppContext,
    name: &str,
    direction: Direction,
    category: Category,
) -> Result<()> {
    let mut session = ctx.open()?;
    report(session.move_competitor(name, direction, category)?);
    print_order(&session, category);
    Ok(())
}

pub fn resolution(ctx: &AppContext, action: ResolutionAction) -> Result<()> {
    let mut session = ctx.open()?;
    match action {
        ResolutionAction::Add { title } => report(session.add_resolution(&title)?),
        ResolutionAction::Remove { title } => report(session.remove_resolution(&title)?),
        ResolutionAction::Next => report(session.advance_resolution()),
        ResolutionAction::Select { title } => report(session.select_resolution(&title)?),
        ResolutionAction::List => {}
    }

    let current = session.resolutions().current();
    if session.resolutions().titles().is_empty() {
        println!("No resolutions.");
    }
    for title in session.resolutions().titles() {
        let marker = if Some(title.as_str()) == current { "*" } else { " " };
        println!("{} {}", marker, title);
    }
    match session.resolution_state() {
        ResolutionState::Active { title, side } => {
            println!("Current: {} (next side {})", title, side.long_name())
        }
        ResolutionState::NoResolution => println!("No resolution active"),
    }
    Ok(())
}

pub fn side(ctx: &AppContext, name: &str, side: Side, resolution: Option<&str>) -> Result<()> {
    let mut session = ctx.open()?;
    report(session.set_competitor_side(name, resolution, side)?);
    println!("{} set to {}", name.trim(), side.long_name());
    Ok(())
}

pub fn history(ctx: &AppContext, category: Option<Category>, restore: Option<usize>) -> Result<()> {
    let mut session = ctx.open()?;

    if let Some(index) = restore {
        let item = session
            .history()
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("No history entry {}", index))?;
        report(session.restore_history_item(&item)?);
        println!(
            "Restored {}'s {} count to {}",
            item.competitor_name, item.action_type, item.old_value
        );
        return Ok(());
    }

    if session.history().is_empty() {
        println!("No history yet.");
        return Ok(());
    }
    match category {
        Some(category) => {
            for item in session.history().recent(category) {
                println!("  {}", item.display_text());
            }
        }
        None => {
            for (index, item) in session.history().iter().enumerate() {
                println!("{:>3}  {}", index, item.display_text());
            }
        }
    }
    Ok(())
}

pub fn stats(ctx: &AppContext, resolution: &str) -> Result<()> {
    let session = ctx.open()?;
    let filter = ResolutionFilter::parse(resolution);
    if let ResolutionFilter::Only(title) = filter {
        if !session.resolutions().contains(title) {
            warn!("'{}' is not in the resolution list", title);
        }
    }

    let rows = resolution_stats(session.competitors(), filter);
    if rows.is_empty() {
        println!("No statistics available. Log speeches to view statistics.");
        return Ok(());
    }
    println!("{:<20} {:<5} {:>8} {:>10}", "Name", "Side", "Speeches", "Avg. Time");
    for row in rows {
        println!(
            "{:<20} {:<5} {:>8} {:>10}",
            row.name,
            row.side.map(|s| s.abbrev()).unwrap_or(""),
            row.speech_count,
            row.average_display()
        );
    }
    Ok(())
}

pub fn status(ctx: &AppContext) -> Result<()> {
    let session = ctx.open()?;
    let path = session
        .path()
        .ok_or_else(|| anyhow!("Session has no file"))?;
    println!("{}", SessionStatus::collect(path, session.competitors()));
    println!("Current Round:   {}", session.current_round());
    Ok(())
}

pub fn notes(ctx: &AppContext, name: &str, text: Option<&str>) -> Result<()> {
    let mut session = ctx.open()?;
    if let Some(text) = text {
        report(session.set_general_notes(name, text)?);
    }

    let competitor = session
        .find_competitor(name)
        .ok_or_else(|| anyhow!("Competitor '{}' not found", name.trim()))?;
    println!("{}", competitor.name);
    if competitor.notes.general.is_empty() {
        println!("  (no notes)");
    } else {
        println!("  {}", competitor.notes.general);
    }
    for speech in &competitor.notes.speeches {
        let side = speech.side.map(|s| s.abbrev()).unwrap_or("-");
        println!(
            "  speech  round {:<3} {:<3} {:>5}  {}",
            speech.round,
            side,
            ctrk_common::time::format_minutes_seconds(speech.duration_secs),
            speech.resolution
        );
    }
    for q in &competitor.notes.questions {
        println!("  question round {}", q.round);
    }
    Ok(())
}

pub fn timer(ctx: &AppContext, limit: Option<u64>, stopwatch: bool) -> Result<()> {
    let mut config = ctx.config.timer.clone();
    if !config.enabled && limit.is_none() && !stopwatch {
        println!("Timer is disabled in the configuration.");
        return Ok(());
    }
    if let Some(limit) = limit {
        config.speech_time_limit_secs = i64::try_from(limit).context("Time limit too large")?;
    }
    if stopwatch {
        config.mode = TimerMode::Stopwatch;
    }
    let timer = SpeechTimer::from_config(&config);
    info!("Timer started ({:?}, limit {}s)", timer.mode(), timer.limit_secs());

    let started = Instant::now();
    let mut stdout = std::io::stdout();
    let mut last_shown = None;
    loop {
        let elapsed = started.elapsed().as_secs();
        if last_shown != Some(elapsed) {
            last_shown = Some(elapsed);
            let reading = timer.reading(elapsed);
            write!(stdout, "\r{}   ", reading.display)?;
            if let Some(mark) = reading.signal {
                write!(stdout, "\n{} seconds remaining\n", mark)?;
            }
            stdout.flush()?;
            if reading.expired {
                writeln!(stdout, "\nTime!")?;
                return Ok(());
            }
        }
        std::thread::sleep(Duration::from_millis(200));
    }
}

pub fn clear(ctx: &AppContext, yes: bool) -> Result<()> {
    let mut session = ctx.open()?;
    if !yes {
        bail!("Refusing to clear without --yes");
    }
    let path = session.path().map(Path::to_path_buf);
    match session.clear_session() {
        Persisted::Failed(e) => return Err(e).context("Failed to delete session files"),
        _ => {
            if let Some(path) = path {
                println!("Cleared {}", path.display());
            }
        }
    }
    Ok(())
}

pub fn config(ctx: &AppContext, write: bool) -> Result<()> {
    let mut config = ctx.config.clone();
    if config.data_folder.is_none() {
        config.data_folder = Some(ctx.data_folder.clone());
    }
    let text = toml::to_string_pretty(&config).context("Failed to render config")?;
    print!("{}", text);

    if write {
        let path = ctx
            .config_arg
            .clone()
            .or_else(config_file_path)
            .ok_or_else(|| anyhow!("Could not determine config file location"))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        write_toml_config(&config, &path)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("90").unwrap(), 90);
        assert_eq!(parse_duration("1:30").unwrap(), 90);
        assert_eq!(parse_duration(" 02:05 ").unwrap(), 125);
        assert_eq!(parse_duration("0:00").unwrap(), 0);
    }

    #[test]
    fn test_parse_duration_rejects_bad_input() {
        assert!(parse_duration("1:75").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("-3").is_err());
        assert!(parse_duration("1:").is_err());
    }

    #[test]
    fn test_parse_duration_rejects_overflow() {
        let huge = format!("{}:00", u64::MAX / 30);
        assert!(parse_duration(&huge).is_err());
        assert!(parse_duration(&format!("{}:59", u64::MAX / 60)).is_err());
    }
}

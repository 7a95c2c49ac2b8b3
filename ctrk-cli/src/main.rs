//! Congress Tracker (ctrk) - command-line front end
//!
//! Each invocation opens a session file, applies one action and saves the
//! session back. Logging goes to stderr; command output goes to stdout.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ctrk_common::config::{load_default_config, load_toml_config, DataFolderResolver};
use ctrk_common::{Category, Direction, Side};
use tracing::debug;

mod commands;

use commands::AppContext;

/// Command-line arguments for ctrk
#[derive(Parser, Debug)]
#[command(name = "ctrk")]
#[command(about = "Turn-order tracker for congress-style debate sessions")]
#[command(version)]
struct Args {
    /// Session file (default: most recent session in the data folder)
    #[arg(short, long, global = true, env = "CTRK_SESSION")]
    session: Option<PathBuf>,

    /// Folder holding session files
    #[arg(short, long, global = true)]
    data_folder: Option<PathBuf>,

    /// Config file (default: CTRK_CONFIG or the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a session from comma-separated names and start tracking
    Start { names: String },
    /// Add competitors (comma-separated)
    Add { names: String },
    /// Rename a competitor
    Rename { old: String, new: String },
    /// Remove a competitor
    Remove { name: String },
    /// Log a speech, optionally with its length (M:SS or seconds)
    Speech {
        name: String,
        #[arg(short, long)]
        time: Option<String>,
    },
    /// Log a question
    Question { name: String },
    /// Show turn order
    Order {
        #[arg(value_enum)]
        category: Option<CategoryArg>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Move a competitor one place in the manual order
    Move {
        name: String,
        #[arg(value_enum)]
        direction: DirectionArg,
        #[arg(short, long, value_enum, default_value = "speech")]
        category: CategoryArg,
    },
    /// Manage debate resolutions
    Resolution {
        #[command(subcommand)]
        action: ResolutionAction,
    },
    /// Set a competitor's side on a resolution (default: the active one)
    Side {
        name: String,
        #[arg(value_enum)]
        side: SideArg,
        #[arg(short, long)]
        resolution: Option<String>,
    },
    /// Show recent actions, or restore an entry's old count
    History {
        #[arg(value_enum)]
        category: Option<CategoryArg>,
        #[arg(long, value_name = "INDEX")]
        restore: Option<usize>,
    },
    /// Per-competitor speech statistics
    Stats {
        /// Resolution title or "All"
        #[arg(short, long, default_value = "All")]
        resolution: String,
    },
    /// Session file status
    Status,
    /// Show or replace a competitor's general notes
    Notes { name: String, text: Option<String> },
    /// Run the speech timer in the terminal
    Timer {
        /// Time limit in seconds (default from config)
        #[arg(long)]
        limit: Option<u64>,
        /// Count up instead of down
        #[arg(long)]
        stopwatch: bool,
    },
    /// Delete the session and its files
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// Show the effective configuration, optionally writing it to the config file
    Config {
        #[arg(long)]
        write: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ResolutionAction {
    /// Append a resolution (the first one becomes active)
    Add { title: String },
    /// Remove a resolution
    Remove { title: String },
    /// Move to the next resolution
    Next,
    /// Make a resolution active
    Select { title: String },
    /// List resolutions
    List,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum CategoryArg {
    Speech,
    Question,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Speech => Category::Speech,
            CategoryArg::Question => Category::Question,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DirectionArg {
    Up,
    Down,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Up => Direction::Up,
            DirectionArg::Down => Direction::Down,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum SideArg {
    #[value(alias = "affirmative")]
    Aff,
    #[value(alias = "negative")]
    Neg,
}

impl From<SideArg> for Side {
    fn from(arg: SideArg) -> Self {
        match arg {
            SideArg::Aff => Side::Affirmative,
            SideArg::Neg => Side::Negative,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_toml_config(path),
        None => load_default_config(),
    };

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    debug!(
        "ctrk v{} [{}] built {}",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    let data_folder = DataFolderResolver::new()
        .with_cli_arg(args.data_folder.clone())
        .with_config(&config)
        .resolve();
    debug!("Data folder: {}", data_folder.display());

    let ctx = AppContext::new(data_folder, args.session.clone(), args.config.clone(), config);

    match args.command {
        Command::Start { names } => commands::start(&ctx, &names),
        Command::Add { names } => commands::add(&ctx, &names),
        Command::Rename { old, new } => commands::rename(&ctx, &old, &new),
        Command::Remove { name } => commands::remove(&ctx, &name),
        Command::Speech { name, time } => commands::speech(&ctx, &name, time.as_deref()),
        Command::Question { name } => commands::question(&ctx, &name),
        Command::Order { category, json } => commands::order(&ctx, category.map(Into::into), json),
        Command::Move {
            name,
            direction,
            category,
        } => commands::move_competitor(&ctx, &name, direction.into(), category.into()),
        Command::Resolution { action } => commands::resolution(&ctx, action),
        Command::Side {
            name,
            side,
            resolution,
        } => commands::side(&ctx, &name, side.into(), resolution.as_deref()),
        Command::History { category, restore } => {
            commands::history(&ctx, category.map(Into::into), restore)
        }
        Command::Stats { resolution } => commands::stats(&ctx, &resolution),
        Command::Status => commands::status(&ctx),
        Command::Notes { name, text } => commands::notes(&ctx, &name, text.as_deref()),
        Command::Timer { limit, stopwatch } => commands::timer(&ctx, limit, stopwatch),
        Command::Clear { yes } => commands::clear(&ctx, yes),
        Command::Config { write } => commands::config(&ctx, write),
    }
}

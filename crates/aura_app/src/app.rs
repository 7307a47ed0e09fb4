use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use aura_core::frequency::{FrequencySpec, Polarity};
use aura_core::item::{ItemEdit, Transition};
use aura_core::schedule::{parse_date, MonthPolicy};
use aura_core::{EngineConfig, EngineError, Tracker, TrackerError};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub(crate) data_path: PathBuf,
    pub(crate) username: String,
    pub(crate) engine: EngineConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    /// Unparsable values are ignored and the default kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup("AURA_DATA_PATH").filter(|path| !path.trim().is_empty()) {
            config.data_path = PathBuf::from(path.trim());
        }
        if let Some(username) = lookup("AURA_USERNAME").filter(|name| !name.trim().is_empty()) {
            config.username = username.trim().to_string();
        }
        if let Some(policy) = lookup("AURA_MONTH_POLICY") {
            if let Ok(value) = policy.parse::<MonthPolicy>() {
                config.engine.month_policy = value;
            }
        }
        let rewards = &mut config.engine.rewards;
        for (key, slot) in [
            ("AURA_REWARD_TASK", &mut rewards.task),
            ("AURA_REWARD_HABIT", &mut rewards.habit),
            ("AURA_REWARD_ROUTINE", &mut rewards.routine),
        ] {
            if let Some(value) = lookup(key).and_then(|raw| raw.trim().parse::<i64>().ok()) {
                if value > 0 {
                    *slot = value;
                }
            }
        }
        if let Some(days) = lookup("AURA_DUE_SOON_DAYS") {
            if let Ok(value) = days.trim().parse::<i64>() {
                config.engine.due_soon_days = value.max(0);
            }
        }
        config
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("aura.json"),
            username: "player".to_string(),
            engine: EngineConfig::default(),
        }
    }
}

/// Gamified habit, routine and task tracker.
#[derive(Parser, Debug)]
#[command(name = "aura", version)]
#[command(about = "Track habits, routines and tasks, and earn aura for keeping up")]
pub struct Cli {
    /// Defaults to `status`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Show player, habits, routines and tasks.
    Status,
    /// Add a habit that recurs every `freq` (e.g. 3d, 2w, 1m).
    AddHabit {
        name: String,
        #[arg(value_parser = parse_frequency)]
        frequency: FrequencySpec,
        /// Completing the habit costs aura instead of earning it.
        #[arg(long)]
        bad: bool,
    },
    /// Add a routine with an optional checklist.
    AddRoutine {
        name: String,
        #[arg(value_parser = parse_frequency)]
        frequency: FrequencySpec,
        entries: Vec<String>,
    },
    /// Add a one-off task due as YYYY-MM-DD or dd-mm-yy.
    AddTask {
        name: String,
        #[arg(value_parser = parse_due)]
        due: NaiveDate,
    },
    /// Flip a habit, routine or task.
    Toggle { id: String },
    /// Tick a routine's checklist entry.
    Check { routine_id: String, entry_id: String },
    /// Rename a habit or routine and change how often it recurs.
    Edit {
        id: String,
        name: String,
        #[arg(value_parser = parse_frequency)]
        frequency: FrequencySpec,
    },
    /// Delete a habit, routine or task.
    Delete { id: String },
    /// Charge overdue items, at most once per day.
    #[command(alias = "penalise")]
    Penalize,
    /// Show every aura change.
    History,
}

fn parse_frequency(token: &str) -> Result<FrequencySpec, EngineError> {
    token.trim().parse()
}

fn parse_due(input: &str) -> Result<NaiveDate, EngineError> {
    parse_date(input)
}

pub fn open_tracker(config: &AppConfig) -> Result<Tracker> {
    Tracker::builder()
        .with_storage(&config.data_path)
        .with_config(config.engine)
        .with_username(config.username.clone())
        .build()
        .with_context(|| format!("failed to open {}", config.data_path.display()))
}

/// Runs one command against the tracker and returns what to print.
pub fn run(tracker: &Tracker, command: Command) -> Result<String> {
    debug!(?command, "running command");
    let mut out = String::new();
    match command {
        Command::Status => {
            let refreshed = tracker.refresh_all()?;
            if refreshed > 0 {
                info!(refreshed, "items reopened");
            }
            write_status(tracker, &mut out)?;
        }
        Command::AddHabit {
            name,
            frequency,
            bad,
        } => {
            let frequency = if bad {
                frequency.with_polarity(Polarity::Bad)
            } else {
                frequency
            };
            let item = tracker.add_habit(&name, frequency)?;
            writeln!(out, "added habit {} ({}) {}", item.name, item.frequency, item.id)?;
        }
        Command::AddRoutine {
            name,
            frequency,
            entries,
        } => {
            let item = tracker.add_routine(&name, frequency, &entries)?;
            writeln!(out, "added routine {} ({}) {}", item.name, item.frequency, item.id)?;
            for entry in &item.checklist {
                writeln!(out, "  [ ] {} {}", entry.text, entry.id)?;
            }
        }
        Command::AddTask { name, due } => {
            let task = tracker.add_task(&name, due)?;
            writeln!(out, "added task {} due {} {}", task.name, task.due_date, task.id)?;
        }
        Command::Toggle { id } => match tracker.toggle_item(&id) {
            Ok(outcome) => {
                describe(&mut out, &outcome.item.name, outcome.transition, outcome.reward)?;
            }
            Err(TrackerError::Engine(EngineError::ItemNotFound { .. })) => {
                let toggled = tracker.toggle_task(&id)?;
                describe(&mut out, &toggled.task.name, toggled.transition, toggled.reward)?;
            }
            Err(err) => return Err(err.into()),
        },
        Command::Check {
            routine_id,
            entry_id,
        } => {
            let outcome = tracker.toggle_checklist_entry(&routine_id, &entry_id)?;
            describe(&mut out, &outcome.item.name, outcome.transition, outcome.reward)?;
        }
        Command::Edit {
            id,
            name,
            frequency,
        } => {
            let item = tracker.edit_item(
                &id,
                ItemEdit {
                    name: Some(name),
                    frequency: Some(frequency),
                    ..ItemEdit::default()
                },
            )?;
            writeln!(out, "updated {} ({})", item.name, item.frequency)?;
        }
        Command::Delete { id } => match tracker.delete_item(&id) {
            Ok(item) => writeln!(out, "deleted {}", item.name)?,
            Err(TrackerError::Engine(EngineError::ItemNotFound { .. })) => {
                let task = tracker.delete_task(&id)?;
                writeln!(out, "deleted {}", task.name)?;
            }
            Err(err) => return Err(err.into()),
        },
        Command::Penalize => {
            let assessment = tracker.apply_overdue_penalties()?;
            if assessment.is_empty() {
                writeln!(out, "nothing overdue")?;
            }
            for entry in &assessment.entries {
                writeln!(out, "-{} {} ({:?})", entry.points, entry.name, entry.category)?;
            }
            let player = tracker.player();
            writeln!(out, "aura {} (level {})", player.aura, player.level)?;
        }
        Command::History => {
            for entry in tracker.history() {
                writeln!(
                    out,
                    "{} {:>+5} {}",
                    entry.at.format("%Y-%m-%d %H:%M"),
                    entry.delta,
                    entry.comment
                )?;
            }
        }
    }
    Ok(out)
}

fn describe(out: &mut String, name: &str, transition: Transition, reward: i64) -> Result<()> {
    match transition {
        Transition::Unchanged => writeln!(out, "{name} unchanged")?,
        Transition::Completed => writeln!(out, "completed {name} ({reward:+} aura)")?,
        Transition::Uncompleted => writeln!(out, "reopened {name} ({reward:+} aura)")?,
    }
    Ok(())
}

fn write_status(tracker: &Tracker, out: &mut String) -> Result<()> {
    let player = tracker.player();
    writeln!(
        out,
        "{} level {} aura {}/{}",
        player.username,
        player.level,
        player.aura,
        player.level_threshold()
    )?;
    if !player.description.is_empty() {
        writeln!(out, "{}", player.description)?;
    }

    let views = tracker.items()?;
    if !views.is_empty() {
        writeln!(out, "\nrecurring:")?;
    }
    for view in views {
        let mark = if view.is_completed { "x" } else { " " };
        writeln!(
            out,
            "  [{mark}] {:<24} {:<20} {}",
            view.name, view.status, view.id
        )?;
    }

    let today = tracker.today();
    let due_soon = tracker.config().due_soon_days;
    let tasks = tracker.tasks();
    if !tasks.is_empty() {
        writeln!(out, "\ntasks:")?;
    }
    for task in tasks {
        let mark = if task.completed { "x" } else { " " };
        writeln!(
            out,
            "  [{mark}] {:<24} {:<20} {}",
            task.name,
            task.status(today, due_soon),
            task.id
        )?;
    }
    Ok(())
}

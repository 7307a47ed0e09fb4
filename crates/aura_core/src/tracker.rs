use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::aura::{apply_penalty, apply_reward, assess_overdue, PenaltyAssessment, Player};
use crate::checklist::{self, ChecklistEntry};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::frequency::FrequencySpec;
use crate::item::{Completion, ItemEdit, ItemKind, ItemView, RecurringItem, ToggleOutcome};
use crate::schedule::MonthPolicy;
use crate::task::{Task, TaskToggle};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed tracker data in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Task,
    Habit,
    Routine,
    Player,
}

impl From<ItemKind> for HistoryKind {
    fn from(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Habit => HistoryKind::Habit,
            ItemKind::Routine => HistoryKind::Routine,
        }
    }
}

/// One aura change, kept in the order it happened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub at: NaiveDateTime,
    pub kind: HistoryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub delta: i64,
    pub comment: String,
}

/// Everything the tracker persists, as a single JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackerState {
    pub player: Player,
    pub habits: Vec<RecurringItem>,
    pub routines: Vec<RecurringItem>,
    pub tasks: Vec<Task>,
    pub history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_penalty_sweep: Option<NaiveDate>,
}

pub struct Tracker {
    path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    state: RwLock<TrackerState>,
}

pub struct TrackerBuilder {
    path: Option<PathBuf>,
    clock: Option<Arc<dyn Clock>>,
    config: EngineConfig,
    username: Option<String>,
}

impl Default for TrackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerBuilder {
    pub fn new() -> Self {
        Self {
            path: None,
            clock: None,
            config: EngineConfig::default(),
            username: None,
        }
    }

    /// Without a storage path the tracker lives in memory only.
    pub fn with_storage(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Username for a freshly created player; ignored when state is loaded.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn build(self) -> TrackerResult<Tracker> {
        let state = match &self.path {
            Some(path) => load_state(path)?,
            None => None,
        };
        let state = state.unwrap_or_else(|| TrackerState {
            player: self.username.map(Player::new).unwrap_or_default(),
            ..TrackerState::default()
        });
        debug!(
            habits = state.habits.len(),
            routines = state.routines.len(),
            tasks = state.tasks.len(),
            "tracker state ready"
        );
        Ok(Tracker {
            path: self.path,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config: self.config,
            state: RwLock::new(state),
        })
    }
}

impl Tracker {
    pub fn builder() -> TrackerBuilder {
        TrackerBuilder::new()
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn player(&self) -> Player {
        self.state.read().player.clone()
    }

    pub fn snapshot(&self) -> TrackerState {
        self.state.read().clone()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state.read().history.clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        let mut tasks = self.state.read().tasks.clone();
        tasks.sort_by_key(|task| (task.completed, task.due_date));
        tasks
    }

    pub fn item(&self, id: &str) -> TrackerResult<RecurringItem> {
        let state = self.state.read();
        state
            .habits
            .iter()
            .chain(state.routines.iter())
            .find(|item| item.id == id)
            .cloned()
            .ok_or_else(|| item_not_found(id).into())
    }

    /// Habits and routines as of today, soonest due first. Passive refreshes
    /// show up here but are only written back by [`Tracker::refresh_all`].
    pub fn items(&self) -> TrackerResult<Vec<ItemView>> {
        let today = self.today();
        let state = self.state.read();
        let mut views = state
            .habits
            .iter()
            .chain(state.routines.iter())
            .map(|item| item.view(today, self.config.month_policy, self.config.due_soon_days))
            .collect::<EngineResult<Vec<_>>>()?;
        views.sort_by_key(|view| view.days_remaining);
        Ok(views)
    }

    #[instrument(skip(self))]
    pub fn add_habit(&self, name: &str, frequency: FrequencySpec) -> TrackerResult<RecurringItem> {
        let item = RecurringItem::new(
            ItemKind::Habit,
            name,
            frequency,
            self.config.rewards.habit,
            self.today(),
        )?;
        self.commit(|state| {
            state.habits.push(item.clone());
            Ok(())
        })?;
        info!(id = %item.id, "habit added");
        Ok(item)
    }

    #[instrument(skip(self))]
    pub fn add_routine(
        &self,
        name: &str,
        frequency: FrequencySpec,
        entries: &[String],
    ) -> TrackerResult<RecurringItem> {
        let checklist = entries
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .map(ChecklistEntry::new)
            .collect();
        let item = RecurringItem::new(
            ItemKind::Routine,
            name,
            frequency,
            self.config.rewards.routine,
            self.today(),
        )?
        .with_checklist(checklist);
        self.commit(|state| {
            state.routines.push(item.clone());
            Ok(())
        })?;
        info!(id = %item.id, "routine added");
        Ok(item)
    }

    #[instrument(skip(self))]
    pub fn add_task(&self, name: &str, due_date: NaiveDate) -> TrackerResult<Task> {
        let task = Task::new(name, due_date, self.config.rewards.task, self.today())?;
        self.commit(|state| {
            state.tasks.push(task.clone());
            Ok(())
        })?;
        info!(id = %task.id, "task added");
        Ok(task)
    }

    /// Flips the item's completion as it stands today.
    #[instrument(skip(self))]
    pub fn toggle_item(&self, id: &str) -> TrackerResult<ToggleOutcome> {
        self.transition_item(id, |item| item.completion().flipped())
    }

    #[instrument(skip(self))]
    pub fn set_item_completion(&self, id: &str, target: Completion) -> TrackerResult<ToggleOutcome> {
        self.transition_item(id, |_| target)
    }

    fn transition_item(
        &self,
        id: &str,
        choose: impl FnOnce(&RecurringItem) -> Completion,
    ) -> TrackerResult<ToggleOutcome> {
        let today = self.today();
        let policy = self.config.month_policy;
        let outcome = self.commit(|state| {
            let outcome = {
                let item = locate(state, id)?;
                let target = choose(&item.refreshed(today, policy)?);
                let outcome = item.toggle(target, today, policy)?;
                *item = outcome.item.clone();
                outcome
            };
            self.record(
                state,
                outcome.item.kind.into(),
                &outcome.item.id,
                outcome.reward,
                format!("{:?} {}", outcome.transition, outcome.item.name),
            );
            Ok(outcome)
        })?;
        debug!(transition = ?outcome.transition, reward = outcome.reward, "item toggled");
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub fn toggle_task(&self, id: &str) -> TrackerResult<TaskToggle> {
        let toggled = self.commit(|state| {
            let toggled = {
                let task = state
                    .tasks
                    .iter_mut()
                    .find(|task| task.id == id)
                    .ok_or_else(|| item_not_found(id))?;
                let toggled = task.toggle(Completion::from_flag(!task.completed));
                *task = toggled.task.clone();
                toggled
            };
            self.record(
                state,
                HistoryKind::Task,
                &toggled.task.id,
                toggled.reward,
                format!("{:?} {}", toggled.transition, toggled.task.name),
            );
            Ok(toggled)
        })?;
        debug!(transition = ?toggled.transition, reward = toggled.reward, "task toggled");
        Ok(toggled)
    }

    #[instrument(skip(self))]
    pub fn edit_item(&self, id: &str, edit: ItemEdit) -> TrackerResult<RecurringItem> {
        self.commit(|state| {
            let item = locate(state, id)?;
            *item = item.edit(edit)?;
            Ok(item.clone())
        })
    }

    #[instrument(skip(self))]
    pub fn delete_item(&self, id: &str) -> TrackerResult<RecurringItem> {
        let removed = self.commit(|state| {
            let habit = state.habits.iter().position(|item| item.id == id);
            let routine = state.routines.iter().position(|item| item.id == id);
            match (habit, routine) {
                (Some(idx), _) => Ok(state.habits.remove(idx)),
                (None, Some(idx)) => Ok(state.routines.remove(idx)),
                (None, None) => Err(item_not_found(id).into()),
            }
        })?;
        info!(name = %removed.name, "item deleted");
        Ok(removed)
    }

    #[instrument(skip(self))]
    pub fn delete_task(&self, id: &str) -> TrackerResult<Task> {
        let removed = self.commit(|state| {
            let idx = state
                .tasks
                .iter()
                .position(|task| task.id == id)
                .ok_or_else(|| item_not_found(id))?;
            Ok(state.tasks.remove(idx))
        })?;
        info!(name = %removed.name, "task deleted");
        Ok(removed)
    }

    #[instrument(skip(self))]
    pub fn toggle_checklist_entry(
        &self,
        routine_id: &str,
        entry_id: &str,
    ) -> TrackerResult<ToggleOutcome> {
        self.edit_checklist(routine_id, |tree| checklist::toggle_entry(tree, entry_id))
    }

    #[instrument(skip(self))]
    pub fn rename_checklist_entry(
        &self,
        routine_id: &str,
        entry_id: &str,
        text: &str,
    ) -> TrackerResult<ToggleOutcome> {
        self.edit_checklist(routine_id, |tree| {
            checklist::update_text(tree, entry_id, text)
        })
    }

    #[instrument(skip(self))]
    pub fn delete_checklist_entry(
        &self,
        routine_id: &str,
        entry_id: &str,
    ) -> TrackerResult<ToggleOutcome> {
        self.edit_checklist(routine_id, |tree| checklist::delete_entry(tree, entry_id))
    }

    #[instrument(skip(self))]
    pub fn indent_checklist_entry(
        &self,
        routine_id: &str,
        entry_id: &str,
    ) -> TrackerResult<ToggleOutcome> {
        self.edit_checklist(routine_id, |tree| checklist::indent(tree, entry_id))
    }

    #[instrument(skip(self))]
    pub fn outdent_checklist_entry(
        &self,
        routine_id: &str,
        entry_id: &str,
    ) -> TrackerResult<ToggleOutcome> {
        self.edit_checklist(routine_id, |tree| checklist::outdent(tree, entry_id))
    }

    /// Adds a blank entry after `after_id` (or first, when `None`) and
    /// returns it. A blank entry in a completed routine reopens the routine.
    #[instrument(skip(self))]
    pub fn insert_checklist_entry(
        &self,
        routine_id: &str,
        after_id: Option<&str>,
        level: u32,
    ) -> TrackerResult<ChecklistEntry> {
        let mut created = None;
        self.edit_checklist(routine_id, |tree| {
            let (tree, entry) = checklist::insert_after(tree, after_id, level)?;
            created = Some(entry);
            Ok(tree)
        })?;
        created.ok_or_else(|| {
            EngineError::ChecklistEntryNotFound {
                id: after_id.unwrap_or_default().to_string(),
            }
            .into()
        })
    }

    fn edit_checklist(
        &self,
        routine_id: &str,
        edit: impl FnOnce(&[ChecklistEntry]) -> EngineResult<Vec<ChecklistEntry>>,
    ) -> TrackerResult<ToggleOutcome> {
        let today = self.today();
        let policy = self.config.month_policy;
        self.commit(|state| {
            let outcome = {
                let routine = state
                    .routines
                    .iter_mut()
                    .find(|item| item.id == routine_id)
                    .ok_or_else(|| item_not_found(routine_id))?;
                let outcome = routine.update_checklist(today, policy, edit)?;
                *routine = outcome.item.clone();
                outcome
            };
            self.record(
                state,
                HistoryKind::Routine,
                &outcome.item.id,
                outcome.reward,
                format!("{:?} {} via checklist", outcome.transition, outcome.item.name),
            );
            Ok(outcome)
        })
    }

    /// Writes passive refreshes back to storage. Returns how many items
    /// started a new cycle.
    #[instrument(skip(self))]
    pub fn refresh_all(&self) -> TrackerResult<usize> {
        let today = self.today();
        let policy = self.config.month_policy;
        let refreshed = self.commit(|state| Ok(refresh_in_place(state, today, policy)?))?;
        if refreshed > 0 {
            info!(refreshed, "items reopened for a new cycle");
        }
        Ok(refreshed)
    }

    /// Charges overdue work against the player's aura. Runs at most once per
    /// day; a second call on the same day returns an empty assessment.
    #[instrument(skip(self))]
    pub fn apply_overdue_penalties(&self) -> TrackerResult<PenaltyAssessment> {
        let today = self.today();
        let policy = self.config.month_policy;
        self.commit(|state| self.sweep_overdue(state, today, policy))
    }

    fn sweep_overdue(
        &self,
        state: &mut TrackerState,
        today: NaiveDate,
        policy: MonthPolicy,
    ) -> TrackerResult<PenaltyAssessment> {
        if state.last_penalty_sweep == Some(today) {
            debug!(%today, "overdue sweep already ran today");
            return Ok(PenaltyAssessment::default());
        }
        refresh_in_place(state, today, policy)?;

        let items: Vec<RecurringItem> = state
            .habits
            .iter()
            .chain(state.routines.iter())
            .cloned()
            .collect();
        let assessment = assess_overdue(&state.tasks, &items, today, policy, &self.config.penalties)?;
        if !assessment.is_empty() {
            let before = state.player.aura;
            state.player = apply_penalty(&state.player, &assessment);
            let delta = state.player.aura - before;
            state.history.push(HistoryEntry {
                at: self.clock.now(),
                kind: HistoryKind::Player,
                item_id: None,
                delta,
                comment: format!(
                    "Overdue penalty of {} point(s) across {} item(s)",
                    assessment.total,
                    assessment.entries.len()
                ),
            });
            info!(total = assessment.total, applied = delta, "overdue penalty applied");
        }
        state.last_penalty_sweep = Some(today);
        Ok(assessment)
    }

    /// Persists the current state; a no-op for in-memory trackers.
    pub fn save(&self) -> TrackerResult<()> {
        let state = self.state.read();
        self.persist(&state)
    }

    /// Runs `mutate` against a copy of the state, persists the copy and only
    /// then swaps it in. On any error the live state is left as it was.
    fn commit<T>(
        &self,
        mutate: impl FnOnce(&mut TrackerState) -> TrackerResult<T>,
    ) -> TrackerResult<T> {
        let mut state = self.state.write();
        let mut next = state.clone();
        let value = mutate(&mut next)?;
        if *state != next {
            self.persist(&next)?;
            *state = next;
        }
        Ok(value)
    }

    fn record(
        &self,
        state: &mut TrackerState,
        kind: HistoryKind,
        item_id: &str,
        delta: i64,
        comment: String,
    ) {
        if delta == 0 {
            return;
        }
        let at = self.clock.now();
        let previous_level = state.player.level;
        state.player = apply_reward(&state.player, delta);
        state.history.push(HistoryEntry {
            at,
            kind,
            item_id: Some(item_id.to_string()),
            delta,
            comment,
        });
        if state.player.level > previous_level {
            info!(level = state.player.level, "level up");
            state.history.push(HistoryEntry {
                at,
                kind: HistoryKind::Player,
                item_id: None,
                delta: 0,
                comment: state.player.description.clone(),
            });
        }
    }

    fn persist(&self, state: &TrackerState) -> TrackerResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| TrackerError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let contents = serde_json::to_string_pretty(state).map_err(|source| TrackerError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(path, contents).map_err(|source| TrackerError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "tracker state saved");
        Ok(())
    }
}

fn load_state(path: &Path) -> TrackerResult<Option<TrackerState>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no tracker data yet");
            return Ok(None);
        }
        Err(source) => {
            return Err(TrackerError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| TrackerError::Json {
            path: path.to_path_buf(),
            source,
        })
}

fn locate<'a>(state: &'a mut TrackerState, id: &str) -> EngineResult<&'a mut RecurringItem> {
    state
        .habits
        .iter_mut()
        .chain(state.routines.iter_mut())
        .find(|item| item.id == id)
        .ok_or_else(|| item_not_found(id))
}

fn refresh_in_place(
    state: &mut TrackerState,
    today: NaiveDate,
    policy: MonthPolicy,
) -> EngineResult<usize> {
    let mut refreshed = 0;
    for item in state.habits.iter_mut().chain(state.routines.iter_mut()) {
        if let Some(next) = item.refresh(today, policy)? {
            *item = next;
            refreshed += 1;
        }
    }
    Ok(refreshed)
}

fn item_not_found(id: &str) -> EngineError {
    EngineError::ItemNotFound { id: id.to_string() }
}

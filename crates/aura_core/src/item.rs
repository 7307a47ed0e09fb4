//! Habits and routines: recurring items whose completion state is derived
//! from `start_date`, `last_completed` and the frequency.
//!
//! An item is completed for the current cycle iff `last_completed > start_date`.
//! The next due date is one interval after the cycle anchor: the day the
//! item was actually completed while completed, the start of the cycle
//! otherwise. Once that date is
//! reached a completed item is refreshed back to incomplete the next time it
//! is read or toggled.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aura::{signed_magnitude, Category, Direction};
use crate::checklist::{self, ChecklistEntry};
use crate::error::{EngineError, EngineResult};
use crate::frequency::{FrequencySpec, Polarity};
use crate::schedule::{days_between, next_occurrence, DueStatus, MonthPolicy};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Habit,
    Routine,
}

impl ItemKind {
    pub fn category(&self) -> Category {
        match self {
            ItemKind::Habit => Category::Habit,
            ItemKind::Routine => Category::Routine,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Completed,
    Incomplete,
}

impl Completion {
    pub fn from_flag(completed: bool) -> Self {
        if completed {
            Completion::Completed
        } else {
            Completion::Incomplete
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Completion::Completed)
    }

    pub fn flipped(&self) -> Self {
        match self {
            Completion::Completed => Completion::Incomplete,
            Completion::Incomplete => Completion::Completed,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Completed,
    Uncompleted,
    Unchanged,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurringItem {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    pub reward_magnitude: i64,
    pub start_date: NaiveDate,
    pub last_completed: NaiveDate,
    pub frequency: FrequencySpec,
    /// Day the current cycle was completed. Differs from `last_completed`
    /// only when completion happened on the cycle's first day, where
    /// `last_completed` is pushed one day past `start_date`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checklist: Vec<ChecklistEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ItemView {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    pub is_completed: bool,
    pub next_due: NaiveDate,
    pub days_remaining: i64,
    pub status: DueStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub item: RecurringItem,
    pub transition: Transition,
    pub reward: i64,
    /// A passive refresh was applied before the toggle.
    pub refreshed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemEdit {
    pub name: Option<String>,
    pub frequency: Option<FrequencySpec>,
    pub reward_magnitude: Option<i64>,
}

impl RecurringItem {
    pub fn new(
        kind: ItemKind,
        name: impl Into<String>,
        frequency: FrequencySpec,
        reward_magnitude: i64,
        today: NaiveDate,
    ) -> EngineResult<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: validated_name(name.into())?,
            kind,
            reward_magnitude,
            start_date: today,
            last_completed: today,
            frequency,
            completed_on: None,
            checklist: Vec::new(),
        })
    }

    pub fn with_checklist(mut self, checklist: Vec<ChecklistEntry>) -> Self {
        self.checklist = checklist;
        self
    }

    pub fn is_completed_now(&self) -> bool {
        self.last_completed > self.start_date
    }

    pub fn completion(&self) -> Completion {
        Completion::from_flag(self.is_completed_now())
    }

    fn cycle_anchor(&self) -> NaiveDate {
        if self.is_completed_now() {
            self.completed_on.unwrap_or(self.last_completed)
        } else {
            self.start_date
        }
    }

    pub fn next_due_date(&self, policy: MonthPolicy) -> EngineResult<NaiveDate> {
        next_occurrence(self.cycle_anchor(), &self.frequency, policy)
    }

    /// The frequency's polarity if it carries one, otherwise the sign of the
    /// reward magnitude.
    pub fn polarity(&self) -> Polarity {
        self.frequency
            .polarity()
            .unwrap_or_else(|| Polarity::from_sign(self.reward_magnitude))
    }

    pub fn days_remaining(&self, today: NaiveDate, policy: MonthPolicy) -> EngineResult<i64> {
        Ok(days_between(today, self.next_due_date(policy)?))
    }

    /// Display snapshot of the item as of `today`, after any passive refresh.
    pub fn view(
        &self,
        today: NaiveDate,
        policy: MonthPolicy,
        due_soon_days: i64,
    ) -> EngineResult<ItemView> {
        let item = self.refreshed(today, policy)?;
        let next_due = item.next_due_date(policy)?;
        let days_remaining = days_between(today, next_due);
        let is_completed = item.is_completed_now();
        Ok(ItemView {
            id: item.id,
            name: item.name,
            kind: item.kind,
            is_completed,
            next_due,
            days_remaining,
            status: DueStatus::classify(days_remaining, due_soon_days),
        })
    }

    /// Passive refresh: a completed item whose next due date has arrived
    /// starts a new cycle today, with every checklist entry cleared.
    /// Returns `None` when nothing changes.
    pub fn refresh(
        &self,
        today: NaiveDate,
        policy: MonthPolicy,
    ) -> EngineResult<Option<RecurringItem>> {
        if !self.is_completed_now() || today < self.next_due_date(policy)? {
            return Ok(None);
        }
        let mut item = self.clone();
        item.start_date = today;
        item.last_completed = today;
        item.completed_on = None;
        if item.kind == ItemKind::Routine {
            item.checklist = checklist::mark_all(&item.checklist, false);
        }
        Ok(Some(item))
    }

    pub fn refreshed(&self, today: NaiveDate, policy: MonthPolicy) -> EngineResult<RecurringItem> {
        Ok(self
            .refresh(today, policy)?
            .unwrap_or_else(|| self.clone()))
    }

    /// Moves the item to `target`. Asking for the state the item is already
    /// in changes nothing and earns nothing.
    pub fn toggle(
        &self,
        target: Completion,
        today: NaiveDate,
        policy: MonthPolicy,
    ) -> EngineResult<ToggleOutcome> {
        let refreshed = self.refresh(today, policy)?;
        let was_refreshed = refreshed.is_some();
        let mut item = refreshed.unwrap_or_else(|| self.clone());
        let (transition, reward) = item.transition_to(target, today, true)?;
        Ok(ToggleOutcome {
            item,
            transition,
            reward,
            refreshed: was_refreshed,
        })
    }

    /// Flips one checklist entry, then rolls the result up to the routine.
    pub fn toggle_checklist_entry(
        &self,
        entry_id: &str,
        today: NaiveDate,
        policy: MonthPolicy,
    ) -> EngineResult<ToggleOutcome> {
        self.update_checklist(today, policy, |tree| checklist::toggle_entry(tree, entry_id))
    }

    /// Applies a checklist edit and rolls up: a non-empty, fully ticked
    /// checklist completes the routine, and an unticked entry in a completed
    /// routine uncompletes it. Other entries keep their state.
    pub fn update_checklist(
        &self,
        today: NaiveDate,
        policy: MonthPolicy,
        edit: impl FnOnce(&[ChecklistEntry]) -> EngineResult<Vec<ChecklistEntry>>,
    ) -> EngineResult<ToggleOutcome> {
        let refreshed = self.refresh(today, policy)?;
        let was_refreshed = refreshed.is_some();
        let mut item = refreshed.unwrap_or_else(|| self.clone());
        item.checklist = edit(&item.checklist)?;

        let target = if item.checklist.is_empty() {
            item.completion()
        } else {
            Completion::from_flag(checklist::all_complete(&item.checklist))
        };
        let (transition, reward) = item.transition_to(target, today, false)?;
        Ok(ToggleOutcome {
            item,
            transition,
            reward,
            refreshed: was_refreshed,
        })
    }

    fn transition_to(
        &mut self,
        target: Completion,
        today: NaiveDate,
        cascade: bool,
    ) -> EngineResult<(Transition, i64)> {
        if self.completion() == target {
            return Ok((Transition::Unchanged, 0));
        }
        let cascade = cascade && self.kind == ItemKind::Routine;
        let (transition, direction) = match target {
            Completion::Completed => {
                self.last_completed = if today > self.start_date {
                    today
                } else {
                    self.start_date
                        .checked_add_signed(Duration::days(1))
                        .ok_or(EngineError::DateOverflow)?
                };
                self.completed_on = Some(today);
                (Transition::Completed, Direction::Complete)
            }
            Completion::Incomplete => {
                self.last_completed = self.start_date;
                self.completed_on = None;
                (Transition::Uncompleted, Direction::Uncomplete)
            }
        };
        if cascade {
            self.checklist = checklist::mark_all(&self.checklist, target.is_completed());
        }
        let reward = signed_magnitude(
            self.reward_magnitude,
            self.kind.category(),
            self.polarity(),
            direction,
        );
        Ok((transition, reward))
    }

    /// Replaces the given fields. The cycle dates are left alone, so the next
    /// due date follows from the new frequency and the existing anchor.
    pub fn edit(&self, edit: ItemEdit) -> EngineResult<RecurringItem> {
        let mut item = self.clone();
        if let Some(name) = edit.name {
            item.name = validated_name(name)?;
        }
        if let Some(frequency) = edit.frequency {
            item.frequency = frequency;
        }
        if let Some(reward_magnitude) = edit.reward_magnitude {
            item.reward_magnitude = reward_magnitude;
        }
        Ok(item)
    }
}

fn validated_name(name: String) -> EngineResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidName);
    }
    Ok(trimmed.to_string())
}

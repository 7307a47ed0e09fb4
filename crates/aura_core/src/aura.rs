//! Aura points, rewards and player levels.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::frequency::Polarity;
use crate::item::{ItemKind, RecurringItem};
use crate::schedule::MonthPolicy;
use crate::task::Task;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Task,
    Habit,
    Routine,
}

/// Base reward per category, used when an item is created without an
/// explicit magnitude.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RewardTable {
    pub task: i64,
    pub habit: i64,
    pub routine: i64,
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            task: 10,
            habit: 15,
            routine: 20,
        }
    }
}

impl RewardTable {
    pub fn base_reward(&self, category: Category) -> i64 {
        match category {
            Category::Task => self.task,
            Category::Habit => self.habit,
            Category::Routine => self.routine,
        }
    }
}

/// Points charged by the overdue sweep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PenaltyTable {
    pub overdue_task: i64,
    pub overdue_routine: i64,
    pub overdue_habit: i64,
}

impl Default for PenaltyTable {
    fn default() -> Self {
        Self {
            overdue_task: 2,
            overdue_routine: 5,
            overdue_habit: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Complete,
    Uncomplete,
}

/// Signs `magnitude` for a completion transition. Tasks and routines earn on
/// completion and give it back on undo; a habit earns when a good habit is
/// done or a bad one is undone.
pub fn signed_magnitude(
    magnitude: i64,
    category: Category,
    polarity: Polarity,
    direction: Direction,
) -> i64 {
    let completing = direction == Direction::Complete;
    let positive = match category {
        Category::Task | Category::Routine => completing,
        Category::Habit => polarity.is_good() == completing,
    };
    let magnitude = magnitude.saturating_abs();
    if positive {
        magnitude
    } else {
        -magnitude
    }
}

pub fn signed_reward(
    category: Category,
    polarity: Polarity,
    direction: Direction,
    table: &RewardTable,
) -> i64 {
    signed_magnitude(table.base_reward(category), category, polarity, direction)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub username: String,
    pub level: u32,
    pub aura: i64,
    #[serde(default)]
    pub description: String,
}

impl Default for Player {
    fn default() -> Self {
        Self::new("player")
    }
}

impl Player {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            level: 1,
            aura: 0,
            description: String::new(),
        }
    }

    pub fn level_threshold(&self) -> i64 {
        i64::from(self.level) * 100
    }
}

/// Adds `delta` to the player's aura and levels up once if the threshold is
/// reached. A single large award still only grants one level. Aura is allowed
/// to go negative here.
pub fn apply_reward(player: &Player, delta: i64) -> Player {
    let mut next = player.clone();
    next.aura = player.aura.saturating_add(delta);
    if next.aura >= player.level_threshold() {
        next.level = player.level.saturating_add(1);
        next.description = format!("You are now level {}", next.level);
    }
    next
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PenaltyEntry {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub points: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PenaltyAssessment {
    pub total: i64,
    pub entries: Vec<PenaltyEntry>,
}

impl PenaltyAssessment {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn charge(&mut self, id: &str, name: &str, category: Category, points: i64) {
        if points <= 0 {
            return;
        }
        self.total += points;
        self.entries.push(PenaltyEntry {
            id: id.to_string(),
            name: name.to_string(),
            category,
            points,
        });
    }
}

/// Charges incomplete tasks past their due date and incomplete routines or
/// habits, of either polarity, whose next due date has passed. Items are expected to have
/// been refreshed for `today` already.
pub fn assess_overdue(
    tasks: &[Task],
    items: &[RecurringItem],
    today: NaiveDate,
    policy: MonthPolicy,
    table: &PenaltyTable,
) -> EngineResult<PenaltyAssessment> {
    let mut assessment = PenaltyAssessment::default();
    for task in tasks.iter().filter(|task| task.is_overdue(today)) {
        assessment.charge(&task.id, &task.name, Category::Task, table.overdue_task);
    }
    for item in items {
        if item.is_completed_now() || item.next_due_date(policy)? >= today {
            continue;
        }
        let points = match item.kind {
            ItemKind::Routine => table.overdue_routine,
            ItemKind::Habit => table.overdue_habit,
        };
        assessment.charge(&item.id, &item.name, item.kind.category(), points);
    }
    Ok(assessment)
}

/// Deducts the assessed points. Unlike [`apply_reward`], a non-negative aura
/// is floored at zero. An aura that is already negative is never raised.
pub fn apply_penalty(player: &Player, assessment: &PenaltyAssessment) -> Player {
    let mut next = player.clone();
    let floor = player.aura.min(0);
    next.aura = player.aura.saturating_sub(assessment.total).max(floor);
    next
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aura::{signed_magnitude, Category, Direction};
use crate::error::{EngineError, EngineResult};
use crate::frequency::Polarity;
use crate::item::{Completion, Transition};
use crate::schedule::{days_between, is_within_forward_year, DueStatus};

/// A one-off to-do with a deadline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub completed: bool,
    pub reward_magnitude: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskToggle {
    pub task: Task,
    pub transition: Transition,
    pub reward: i64,
}

impl Task {
    /// Deadlines must fall between `today` and one year ahead.
    pub fn new(
        name: impl Into<String>,
        due_date: NaiveDate,
        reward_magnitude: i64,
        today: NaiveDate,
    ) -> EngineResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EngineError::InvalidName);
        }
        if !is_within_forward_year(due_date, today) {
            return Err(EngineError::InvalidDate {
                input: due_date.to_string(),
            });
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            due_date,
            completed: false,
            reward_magnitude,
        })
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date < today
    }

    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        days_between(today, self.due_date)
    }

    pub fn status(&self, today: NaiveDate, due_soon_days: i64) -> DueStatus {
        DueStatus::classify(self.days_remaining(today), due_soon_days)
    }

    pub fn toggle(&self, target: Completion) -> TaskToggle {
        let current = Completion::from_flag(self.completed);
        if current == target {
            return TaskToggle {
                task: self.clone(),
                transition: Transition::Unchanged,
                reward: 0,
            };
        }
        let (transition, direction) = match target {
            Completion::Completed => (Transition::Completed, Direction::Complete),
            Completion::Incomplete => (Transition::Uncompleted, Direction::Uncomplete),
        };
        TaskToggle {
            task: Task {
                completed: target.is_completed(),
                ..self.clone()
            },
            transition,
            reward: signed_magnitude(
                self.reward_magnitude,
                Category::Task,
                Polarity::Good,
                direction,
            ),
        }
    }
}

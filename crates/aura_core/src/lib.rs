pub mod aura;
pub mod checklist;
pub mod clock;
pub mod config;
pub mod error;
pub mod frequency;
pub mod item;
pub mod schedule;
pub mod task;
pub mod tracker;

pub use crate::config::EngineConfig;
pub use crate::error::{EngineError, EngineResult};
pub use crate::tracker::{Tracker, TrackerBuilder, TrackerError, TrackerResult};

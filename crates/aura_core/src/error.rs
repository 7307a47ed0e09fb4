use thiserror::Error;

/// Failures surfaced by the scheduling, reward and checklist engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid frequency: {reason}")]
    InvalidFrequency { reason: String },

    #[error("item name must not be empty")]
    InvalidName,

    #[error("unrecognised date `{input}`")]
    InvalidDate { input: String },

    #[error("item not found: {id}")]
    ItemNotFound { id: String },

    #[error("checklist entry not found: {id}")]
    ChecklistEntryNotFound { id: String },

    #[error("date arithmetic overflowed the calendar")]
    DateOverflow,
}

impl EngineError {
    pub(crate) fn invalid_frequency(reason: impl Into<String>) -> Self {
        Self::InvalidFrequency {
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

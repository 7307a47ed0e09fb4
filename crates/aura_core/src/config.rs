use serde::{Deserialize, Serialize};

use crate::aura::{PenaltyTable, RewardTable};
use crate::schedule::MonthPolicy;

/// Tunables shared by every engine operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub month_policy: MonthPolicy,
    pub rewards: RewardTable,
    pub penalties: PenaltyTable,
    /// Items due within this many days are reported as due soon.
    pub due_soon_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            month_policy: MonthPolicy::default(),
            rewards: RewardTable::default(),
            penalties: PenaltyTable::default(),
            due_soon_days: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "month_policy": "thirty-days" }"#).unwrap();
        assert_eq!(config.month_policy, MonthPolicy::ThirtyDays);
        assert_eq!(config.rewards, RewardTable::default());
        assert_eq!(config.due_soon_days, 3);
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Selection loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionState {
    ReadyForSubscribe,
    SubscriptionNotUpdated,
    FindFastestProxy,
    SwitchToFastest,
    Check,
    Done,
    TemporaryAnomaly,
    Error,
}

impl SelectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionState::ReadyForSubscribe => "ready_for_subscribe",
            SelectionState::SubscriptionNotUpdated => "subscription_not_updated",
            SelectionState::FindFastestProxy => "find_fastest_proxy",
            SelectionState::SwitchToFastest => "switch_to_fastest",
            SelectionState::Check => "check",
            SelectionState::Done => "done",
            SelectionState::TemporaryAnomaly => "temporary_anomaly",
            SelectionState::Error => "error",
        }
    }

    /// States the loop sleeps in before subscribing again
    pub fn is_sleep_point(&self) -> bool {
        matches!(
            self,
            SelectionState::SubscriptionNotUpdated
                | SelectionState::Done
                | SelectionState::TemporaryAnomaly
                | SelectionState::Error
        )
    }
}

impl std::fmt::Display for SelectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Published after every transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitcherStatus {
    pub state: SelectionState,
    /// Id of the Current Fastest proxy
    pub current: Option<String>,
    pub pool_size: usize,
    pub updated_at: DateTime<Utc>,
}

impl Default for SwitcherStatus {
    fn default() -> Self {
        Self {
            state: SelectionState::ReadyForSubscribe,
            current: None,
            pool_size: 0,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_points() {
        let sleeping: Vec<_> = [
            SelectionState::ReadyForSubscribe,
            SelectionState::SubscriptionNotUpdated,
            SelectionState::FindFastestProxy,
            SelectionState::SwitchToFastest,
            SelectionState::Check,
            SelectionState::Done,
            SelectionState::TemporaryAnomaly,
            SelectionState::Error,
        ]
        .into_iter()
        .filter(SelectionState::is_sleep_point)
        .collect();

        assert_eq!(
            sleeping,
            vec![
                SelectionState::SubscriptionNotUpdated,
                SelectionState::Done,
                SelectionState::TemporaryAnomaly,
                SelectionState::Error,
            ]
        );
    }

    #[test]
    fn test_state_names_match_serialization() {
        for state in [SelectionState::SwitchToFastest, SelectionState::TemporaryAnomaly] {
            let json = serde_json::to_value(state).unwrap();
            assert_eq!(json, state.as_str());
            assert_eq!(state.to_string(), state.as_str());
        }
    }
}

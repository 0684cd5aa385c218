use serde::{Deserialize, Serialize};

/// Side information about a transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StepInfo {
    /// The action targeted an opened, avoid-marked or out-of-range cell.
    /// Callers that filter through `legal_actions` never see this.
    pub illegal: bool,
    /// The opened cell was a mine.
    pub mine: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct StepResult {
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

impl StepResult {
    pub fn new(reward: f64, done: bool) -> Self {
        Self {
            reward,
            done,
            info: StepInfo::default(),
        }
    }

    pub fn illegal() -> Self {
        Self {
            reward: 0.0,
            done: false,
            info: StepInfo {
                illegal: true,
                mine: false,
            },
        }
    }
}

//! 單一服務在計畫中的執行狀態。

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepState {
    Pending,
    Validating,
    Executing,
    Succeeded,
    Failed,
}

impl StepState {
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use StepState::*;
        matches!(
            (self, target),
            (Pending, Validating)
                | (Pending, Executing)
                | (Validating, Executing)
                | (Validating, Failed)
                | (Executing, Succeeded)
                | (Executing, Failed)
        )
    }

    pub fn valid_transitions(&self) -> Vec<Self> {
        use StepState::*;
        match self {
            Pending => vec![Validating, Executing],
            Validating => vec![Executing, Failed],
            Executing => vec![Succeeded, Failed],
            Succeeded | Failed => vec![],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

/// 追蹤狀態並拒絕不合法的轉換
#[derive(Debug, Clone)]
pub struct StepTracker {
    state: StepState,
}

impl StepTracker {
    pub fn new() -> Self {
        Self {
            state: StepState::Pending,
        }
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    /// 不合法的轉換屬於程式錯誤，以 debug_assert 攔截，狀態保持不變
    pub fn advance(&mut self, target: StepState) -> StepState {
        let allowed = self.state.can_transition_to(&target);
        debug_assert!(allowed, "invalid step transition {:?} -> {:?}", self.state, target);
        if allowed {
            tracing::trace!("step state {:?} -> {:?}", self.state, target);
            self.state = target;
        }
        self.state
    }
}

impl Default for StepTracker {
    fn default() -> Self {
        Self::new()
    }
}

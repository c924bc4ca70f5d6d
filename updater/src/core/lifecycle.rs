//! Stage lifecycle transition table.
//!
//! `Idle -> Created -> Staged -> Applied -> PostApplied`, with `destroy`
//! allowed from every state and always landing on `Idle`.

use std::fmt;

use crate::core::types::StageState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOperation {
    Create,
    Stage,
    Apply,
    PostApply,
    Destroy,
}

impl fmt::Display for StageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StageOperation::Create => "create",
            StageOperation::Stage => "stage",
            StageOperation::Apply => "apply",
            StageOperation::PostApply => "post_apply",
            StageOperation::Destroy => "destroy",
        };
        f.write_str(label)
    }
}

/// State reached by running `operation` from `from`, or `None` if the
/// operation is not allowed there.
pub fn next_state(from: StageState, operation: StageOperation) -> Option<StageState> {
    match (from, operation) {
        (_, StageOperation::Destroy) => Some(StageState::Idle),
        (StageState::Idle, StageOperation::Create) => Some(StageState::Created),
        (StageState::Created, StageOperation::Stage) => Some(StageState::Staged),
        (StageState::Staged, StageOperation::Apply) => Some(StageState::Applied),
        (StageState::Applied, StageOperation::PostApply) => Some(StageState::PostApplied),
        _ => None,
    }
}

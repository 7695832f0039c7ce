//! Shared error taxonomy for review actions.
//!
//! Every guard violation is an expected, recoverable condition surfaced to
//! the acting reviewer with the invariant that blocked it. Nothing here is
//! a panic path.

use crate::{ActorId, AreaId};
use thiserror::Error;

/// Result alias used across the platform crates.
pub type AssessmentResult<T> = Result<T, AssessmentError>;

/// Errors returned by review actions and the state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssessmentError {
    /// The requested action is not legal from the current status.
    #[error("cannot {action} while in status {from}")]
    InvalidTransition { from: String, action: String },

    /// The single rework round for this assessment has already been used.
    #[error("rework already used for this assessment")]
    ReworkLimitReached,

    /// The area has already consumed its one calibration round.
    #[error("area {area} has already been calibrated for this assessment")]
    CalibrationLimitReached { area: AreaId },

    /// The final approver's re-calibration allowance is exhausted.
    #[error("final approver re-calibration limit reached")]
    RecalibrationLimitReached,

    /// A failing decision requires a non-empty public explanation.
    #[error("a failed indicator with a public comment is required in area {area}")]
    MissingRequiredComment { area: AreaId },

    /// The completeness oracle rejected the submission.
    #[error("submission is incomplete; answer all requirements first")]
    IncompleteSubmission,

    /// Finalization requires a decision on every indicator.
    #[error("cannot finalize while {count} indicator decisions are pending")]
    PendingDecisions { count: usize },

    /// The actor does not hold the scope this action requires.
    #[error("actor {actor} is not authorized for this action")]
    UnauthorizedActor { actor: ActorId },

    /// The governance area is not part of this assessment.
    #[error("unknown governance area {area}")]
    UnknownArea { area: AreaId },

    /// The named entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The aggregate changed underneath this action; the caller may retry.
    #[error("assessment was modified concurrently; retry the action")]
    ConcurrentModification,

    /// The persistence layer failed; the action was not applied.
    #[error("storage error: {0}")]
    Storage(String),
}

impl AssessmentError {
    /// Build an `InvalidTransition` from anything displayable.
    pub fn invalid_transition(from: impl std::fmt::Display, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            action: action.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_blocking_invariant() {
        let err = AssessmentError::ReworkLimitReached;
        assert!(err.to_string().contains("rework already used"));

        let err = AssessmentError::CalibrationLimitReached {
            area: AreaId::new("area-2"),
        };
        assert!(err.to_string().contains("area-2"));

        let err = AssessmentError::invalid_transition("completed", "approve_area");
        assert!(err.to_string().contains("completed"));
        assert!(err.to_string().contains("approve_area"));
    }
}

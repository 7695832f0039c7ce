//! Immutable audit log entries with before/after values.

use crate::{ActorId, AuditEntryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The state-changing action an audit entry describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AssessmentCreated,
    Submitted,
    AreaReviewStarted,
    AreaApproved,
    AreaReworkRequested,
    Resubmitted,
    StatusChanged,
    Finalized,
    CalibrationRequested,
    CalibrationSubmitted,
    RecalibrationRequested,
    RecalibrationSubmitted,
    AssessmentApproved,
    ValidationSaved,
    CalibrationFlagged,
    CommentAdded,
    ChecklistSaved,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Reuse the serde spelling so logs and queries agree.
        let s = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        write!(f, "{}", s.trim_matches('"'))
    }
}

/// What kind of entity an audit entry is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntityType {
    Assessment,
    AreaApproval,
    IndicatorResponse,
}

/// One immutable before/after record of a state-changing action.
///
/// Entries are only ever appended, in the same atomic unit as the mutation
/// they describe; they are never updated or deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: AuditEntryId,
    pub actor_id: ActorId,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub entity_type: AuditEntityType,
    pub entity_id: String,
    /// Values of the changed keys before the action.
    pub before: serde_json::Value,
    /// Values of the changed keys after the action.
    pub after: serde_json::Value,
}

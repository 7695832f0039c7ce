//! Snapshot views used for audit diffing.

use assessment_types::{AreaApproval, Assessment};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Global aggregate fields that review actions can change. Kept separate
/// from the full aggregate serialization so assessment-level audit entries
/// do not duplicate every per-area change.
#[derive(Serialize)]
pub(crate) struct StatusSnapshot {
    status: String,
    rework_round_used: bool,
    is_calibration_rework: bool,
    is_final_approver_recalibration: bool,
    final_approver_recalibration_count: u32,
    calibrated_area_ids: Vec<String>,
    open_calibrations: usize,
    submitted_at: Option<DateTime<Utc>>,
    finalized_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    pub(crate) fn of(assessment: &Assessment) -> Self {
        Self {
            status: assessment.status.to_string(),
            rework_round_used: assessment.rework_round_used,
            is_calibration_rework: assessment.is_calibration_rework,
            is_final_approver_recalibration: assessment.is_final_approver_recalibration,
            final_approver_recalibration_count: assessment.final_approver_recalibration_count,
            calibrated_area_ids: assessment
                .calibrated_area_ids
                .iter()
                .map(|a| a.to_string())
                .collect(),
            open_calibrations: assessment
                .pending_calibrations
                .iter()
                .filter(|c| !c.resolved)
                .count(),
            submitted_at: assessment.submitted_at,
            finalized_at: assessment.finalized_at,
            completed_at: assessment.completed_at,
        }
    }
}

pub(crate) fn area_snapshot(area: &AreaApproval) -> Value {
    serde_json::to_value(area).unwrap_or(Value::Null)
}

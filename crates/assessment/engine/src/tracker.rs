//! Per-area approval tracker.
//!
//! Owns the sub-state transitions of a single governance area within one
//! assessment and produces the audit entries describing them. The
//! orchestrator calls in here for area-local bookkeeping, then re-evaluates
//! the aggregate condition and commits everything in one unit.

use crate::snapshot::{area_snapshot, StatusSnapshot};
use assessment_audit::AuditRecorder;
use assessment_types::{
    ActorId, AreaId, Assessment, AssessmentError, AssessmentResult, AuditAction, AuditEntityType,
    AuditLogEntry, ReworkPolicy,
};
use serde_json::Value;

/// Result of one area approval.
pub struct AreaApprovalOutcome {
    /// True when this approval was the last one and the assessment moved
    /// to awaiting final validation.
    pub reached_final_validation: bool,
    pub entries: Vec<AuditLogEntry>,
}

/// Area-local transition logic.
#[derive(Clone, Copy, Debug, Default)]
pub struct AreaTracker {
    recorder: AuditRecorder,
}

impl AreaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn area_entity_id(assessment: &Assessment, area_id: &AreaId) -> String {
        format!("{}/{}", assessment.id, area_id)
    }

    /// Move one area into review.
    pub fn begin_review(
        &self,
        assessment: &mut Assessment,
        area_id: &AreaId,
        actor: &ActorId,
    ) -> AssessmentResult<Vec<AuditLogEntry>> {
        let before = area_snapshot(assessment.area(area_id)?);
        assessment.begin_area_review(area_id)?;
        let after = area_snapshot(assessment.area(area_id)?);
        Ok(vec![self.recorder.entry(
            actor,
            AuditAction::AreaReviewStarted,
            AuditEntityType::AreaApproval,
            Self::area_entity_id(assessment, area_id),
            &before,
            &after,
        )])
    }

    /// Approve one area. The aggregate condition is re-checked inside the
    /// same mutation, so a racing last approval resolves at commit time to
    /// exactly one global transition.
    pub fn approve(
        &self,
        assessment: &mut Assessment,
        area_id: &AreaId,
        actor: &ActorId,
    ) -> AssessmentResult<AreaApprovalOutcome> {
        let before_area = area_snapshot(assessment.area(area_id)?);
        let before_global = StatusSnapshot::of(assessment);

        let reached_final_validation = assessment.approve_area(area_id, actor)?;

        let mut entries = vec![self.recorder.entry(
            actor,
            AuditAction::AreaApproved,
            AuditEntityType::AreaApproval,
            Self::area_entity_id(assessment, area_id),
            &before_area,
            &area_snapshot(assessment.area(area_id)?),
        )];
        if reached_final_validation {
            entries.push(self.recorder.entry(
                actor,
                AuditAction::StatusChanged,
                AuditEntityType::Assessment,
                assessment.id.to_string(),
                &before_global,
                &StatusSnapshot::of(assessment),
            ));
        }
        Ok(AreaApprovalOutcome {
            reached_final_validation,
            entries,
        })
    }

    /// Send one area back for rework. The caller has already verified the
    /// failing-indicator precondition; this enforces the comment and the
    /// configured rework limit.
    pub fn request_rework(
        &self,
        assessment: &mut Assessment,
        area_id: &AreaId,
        actor: &ActorId,
        policy: ReworkPolicy,
        comment: &str,
    ) -> AssessmentResult<Vec<AuditLogEntry>> {
        if comment.trim().is_empty() {
            return Err(AssessmentError::MissingRequiredComment {
                area: area_id.clone(),
            });
        }
        let before_area = area_snapshot(assessment.area(area_id)?);
        let before_global = StatusSnapshot::of(assessment);

        assessment.request_area_rework(area_id, policy)?;

        let mut area_entry = self.recorder.entry(
            actor,
            AuditAction::AreaReworkRequested,
            AuditEntityType::AreaApproval,
            Self::area_entity_id(assessment, area_id),
            &before_area,
            &area_snapshot(assessment.area(area_id)?),
        );
        if let Value::Object(after) = &mut area_entry.after {
            after.insert("rework_comment".to_string(), Value::from(comment));
        }

        let status_entry = self.recorder.entry(
            actor,
            AuditAction::StatusChanged,
            AuditEntityType::Assessment,
            assessment.id.to_string(),
            &before_global,
            &StatusSnapshot::of(assessment),
        );
        Ok(vec![area_entry, status_entry])
    }
}

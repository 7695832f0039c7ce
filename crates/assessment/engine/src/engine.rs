//! The review orchestrator.
//!
//! Every state-changing operation follows the same shape: resolve the
//! actor's scope, load the aggregate, apply the guarded transition, and
//! commit the mutated aggregate together with its audit entries in one
//! atomic unit. A version conflict triggers exactly one reload-and-retry
//! before the caller sees `ConcurrentModification`.

use crate::collaborators::{
    CompletenessChecker, NotificationSink, ReviewerDirectory, ReviewerScope, SummaryGenerator,
};
use crate::snapshot::StatusSnapshot;
use crate::tracker::AreaTracker;
use crate::unlock::is_requirement_unlocked;
use assessment_audit::AuditRecorder;
use assessment_evaluator::{evaluate, Evaluation};
use assessment_storage::{AuditQuery, Page, ReviewStore, StorageError};
use assessment_types::{
    ActorId, AreaId, Assessment, AssessmentError, AssessmentId, AssessmentResult, AuditAction,
    AuditEntityType, AuditLogEntry, ChecklistSchema, CommentVisibility, CycleId, EngineConfig,
    IndicatorResponse, IndicatorResponseId, RequirementId, UnitId, ValidationStatus,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One requirement in the cycle's catalog, used to seed indicator rows
/// when an assessment is created.
#[derive(Clone, Debug)]
pub struct CatalogEntry {
    pub requirement_id: RequirementId,
    pub area_id: AreaId,
}

fn storage_err(err: StorageError) -> AssessmentError {
    match err {
        StorageError::NotFound(what) => AssessmentError::NotFound(what),
        StorageError::VersionConflict { .. } => AssessmentError::ConcurrentModification,
        other => AssessmentError::Storage(other.to_string()),
    }
}

/// Orchestrates assessment review: lifecycle transitions, indicator
/// decisions, and the audit trail around both.
pub struct AssessmentEngine {
    store: Arc<dyn ReviewStore>,
    recorder: AuditRecorder,
    tracker: AreaTracker,
    completeness: Arc<dyn CompletenessChecker>,
    summaries: Arc<dyn SummaryGenerator>,
    notifier: Arc<dyn NotificationSink>,
    reviewers: Arc<dyn ReviewerDirectory>,
    config: EngineConfig,
}

impl AssessmentEngine {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        completeness: Arc<dyn CompletenessChecker>,
        summaries: Arc<dyn SummaryGenerator>,
        notifier: Arc<dyn NotificationSink>,
        reviewers: Arc<dyn ReviewerDirectory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            recorder: AuditRecorder::new(),
            tracker: AreaTracker::new(),
            completeness,
            summaries,
            notifier,
            reviewers,
            config,
        }
    }

    // ── Authorization ────────────────────────────────────────────────

    fn scope_of(&self, actor: &ActorId) -> AssessmentResult<ReviewerScope> {
        self.reviewers
            .scope(actor)
            .ok_or_else(|| AssessmentError::UnauthorizedActor {
                actor: actor.clone(),
            })
    }

    fn require_submitting_unit(&self, actor: &ActorId) -> AssessmentResult<()> {
        match self.scope_of(actor)? {
            ReviewerScope::SubmittingUnit => Ok(()),
            _ => Err(AssessmentError::UnauthorizedActor {
                actor: actor.clone(),
            }),
        }
    }

    fn require_area_reviewer(&self, actor: &ActorId, area_id: &AreaId) -> AssessmentResult<()> {
        match self.scope_of(actor)? {
            ReviewerScope::Area(ref assigned) if assigned == area_id => Ok(()),
            _ => Err(AssessmentError::UnauthorizedActor {
                actor: actor.clone(),
            }),
        }
    }

    fn require_system_wide(&self, actor: &ActorId) -> AssessmentResult<()> {
        match self.scope_of(actor)? {
            ReviewerScope::SystemWide => Ok(()),
            _ => Err(AssessmentError::UnauthorizedActor {
                actor: actor.clone(),
            }),
        }
    }

    fn require_final_approver(&self, actor: &ActorId) -> AssessmentResult<()> {
        match self.scope_of(actor)? {
            ReviewerScope::FinalApprover => Ok(()),
            _ => Err(AssessmentError::UnauthorizedActor {
                actor: actor.clone(),
            }),
        }
    }

    /// Any reviewer role may decide on an indicator in its area.
    fn require_indicator_reviewer(
        &self,
        actor: &ActorId,
        area_id: &AreaId,
    ) -> AssessmentResult<()> {
        match self.scope_of(actor)? {
            ReviewerScope::Area(ref assigned) if assigned == area_id => Ok(()),
            ReviewerScope::SystemWide | ReviewerScope::FinalApprover => Ok(()),
            _ => Err(AssessmentError::UnauthorizedActor {
                actor: actor.clone(),
            }),
        }
    }

    // ── Commit loop ──────────────────────────────────────────────────

    /// Load, apply, commit. Retries exactly once on a version conflict by
    /// reloading the current aggregate and re-running the guards; a second
    /// conflict surfaces as `ConcurrentModification`.
    async fn mutate<R, F>(
        &self,
        id: &AssessmentId,
        mut apply: F,
    ) -> AssessmentResult<(Assessment, R)>
    where
        F: FnMut(&mut Assessment) -> AssessmentResult<(Vec<AuditLogEntry>, R)>,
    {
        for attempt in 0..2u8 {
            let mut assessment = self.store.load_assessment(id).await.map_err(storage_err)?;
            let expected = assessment.version;
            let (entries, value) = apply(&mut assessment)?;
            match self
                .store
                .commit_assessment(assessment.clone(), expected, entries)
                .await
            {
                Ok(()) => {
                    assessment.version = expected + 1;
                    return Ok((assessment, value));
                }
                Err(StorageError::VersionConflict { .. }) if attempt == 0 => continue,
                Err(err) => return Err(storage_err(err)),
            }
        }
        Err(AssessmentError::ConcurrentModification)
    }

    // ── Lifecycle operations ─────────────────────────────────────────

    /// Open a new draft assessment for one unit, seeding one indicator row
    /// per catalog requirement.
    pub async fn create_assessment(
        &self,
        actor: &ActorId,
        cycle_id: CycleId,
        unit_id: UnitId,
        catalog: &[CatalogEntry],
    ) -> AssessmentResult<Assessment> {
        self.require_submitting_unit(actor)?;
        for entry in catalog {
            if !self.config.governance_areas.contains(&entry.area_id) {
                return Err(AssessmentError::UnknownArea {
                    area: entry.area_id.clone(),
                });
            }
        }

        let assessment = Assessment::new(cycle_id, unit_id, &self.config.governance_areas);
        let created = self.recorder.entry(
            actor,
            AuditAction::AssessmentCreated,
            AuditEntityType::Assessment,
            assessment.id.to_string(),
            &Value::Null,
            &serde_json::to_value(StatusSnapshot::of(&assessment)).unwrap_or(Value::Null),
        );
        self.store
            .insert_assessment(assessment.clone(), vec![created])
            .await
            .map_err(storage_err)?;

        for entry in catalog {
            let row = IndicatorResponse::new(
                assessment.id.clone(),
                entry.requirement_id.clone(),
                entry.area_id.clone(),
            );
            self.store.insert_indicator(row).await.map_err(storage_err)?;
        }

        tracing::info!(
            assessment_id = %assessment.id,
            unit_id = %assessment.unit_id,
            requirements = catalog.len(),
            "assessment created"
        );
        Ok(assessment)
    }

    /// Submit a draft for review. Rejected while any requirement is still
    /// unanswered.
    pub async fn submit(
        &self,
        actor: &ActorId,
        id: &AssessmentId,
    ) -> AssessmentResult<Assessment> {
        self.require_submitting_unit(actor)?;
        if !self.completeness.is_complete(id).await {
            return Err(AssessmentError::IncompleteSubmission);
        }

        let (assessment, _) = self
            .mutate(id, |a| {
                let before = StatusSnapshot::of(a);
                a.submit()?;
                let entry = self.recorder.entry(
                    actor,
                    AuditAction::Submitted,
                    AuditEntityType::Assessment,
                    a.id.to_string(),
                    &before,
                    &StatusSnapshot::of(a),
                );
                Ok((vec![entry], ()))
            })
            .await?;

        self.notifier.on_status_changed(id, assessment.status);
        tracing::info!(assessment_id = %id, "assessment submitted");
        Ok(assessment)
    }

    /// Start review of one governance area.
    pub async fn begin_area_review(
        &self,
        actor: &ActorId,
        id: &AssessmentId,
        area_id: &AreaId,
    ) -> AssessmentResult<Assessment> {
        self.require_area_reviewer(actor, area_id)?;
        let (assessment, _) = self
            .mutate(id, |a| {
                let entries = self.tracker.begin_review(a, area_id, actor)?;
                Ok((entries, ()))
            })
            .await?;
        tracing::info!(assessment_id = %id, area_id = %area_id, "area review started");
        Ok(assessment)
    }

    /// Approve one governance area. The last approval moves the assessment
    /// to awaiting final validation.
    pub async fn approve_area(
        &self,
        actor: &ActorId,
        id: &AssessmentId,
        area_id: &AreaId,
    ) -> AssessmentResult<Assessment> {
        self.require_area_reviewer(actor, area_id)?;
        let (assessment, reached_final_validation) = self
            .mutate(id, |a| {
                let outcome = self.tracker.approve(a, area_id, actor)?;
                Ok((outcome.entries, outcome.reached_final_validation))
            })
            .await?;

        self.notifier.on_area_approved(id, area_id);
        if reached_final_validation {
            self.notifier.on_status_changed(id, assessment.status);
        }
        tracing::info!(
            assessment_id = %id,
            area_id = %area_id,
            status = %assessment.status,
            "area approved"
        );
        Ok(assessment)
    }

    /// Send one area back for correction. Requires at least one failed
    /// indicator in the area carrying a public comment, plus a non-empty
    /// rework comment, so the submitting unit always learns why.
    ///
    /// Indicator rows version independently of the aggregate, so the
    /// failed-indicator check is re-read on every commit attempt. It is a
    /// request-time guard, not a lock against later indicator edits.
    pub async fn request_area_rework(
        &self,
        actor: &ActorId,
        id: &AssessmentId,
        area_id: &AreaId,
        comment: &str,
    ) -> AssessmentResult<Assessment> {
        self.require_area_reviewer(actor, area_id)?;
        let policy = self.config.rework_policy;

        for attempt in 0..2u8 {
            let rows = self.store.list_indicators(id).await.map_err(storage_err)?;
            let has_explained_failure = rows.iter().any(|r| {
                &r.area_id == area_id
                    && r.validation_status == ValidationStatus::Fail
                    && r.has_public_comment()
            });
            if !has_explained_failure {
                return Err(AssessmentError::MissingRequiredComment {
                    area: area_id.clone(),
                });
            }

            let mut assessment = self.store.load_assessment(id).await.map_err(storage_err)?;
            let expected = assessment.version;
            let entries =
                self.tracker
                    .request_rework(&mut assessment, area_id, actor, policy, comment)?;
            match self
                .store
                .commit_assessment(assessment.clone(), expected, entries)
                .await
            {
                Ok(()) => {
                    assessment.version = expected + 1;
                    self.notifier.on_status_changed(id, assessment.status);
                    tracing::info!(assessment_id = %id, area_id = %area_id, "area rework requested");
                    return Ok(assessment);
                }
                Err(StorageError::VersionConflict { .. }) if attempt == 0 => continue,
                Err(err) => return Err(storage_err(err)),
            }
        }
        Err(AssessmentError::ConcurrentModification)
    }

    /// Return a corrected plain-rework assessment to the review queue.
    pub async fn resubmit(
        &self,
        actor: &ActorId,
        id: &AssessmentId,
    ) -> AssessmentResult<Assessment> {
        self.require_submitting_unit(actor)?;
        if !self.completeness.is_complete(id).await {
            return Err(AssessmentError::IncompleteSubmission);
        }

        let (assessment, _) = self
            .mutate(id, |a| {
                let before = StatusSnapshot::of(a);
                a.resubmit()?;
                let entry = self.recorder.entry(
                    actor,
                    AuditAction::Resubmitted,
                    AuditEntityType::Assessment,
                    a.id.to_string(),
                    &before,
                    &StatusSnapshot::of(a),
                );
                Ok((vec![entry], ()))
            })
            .await?;

        self.notifier.on_status_changed(id, assessment.status);
        tracing::info!(assessment_id = %id, "assessment resubmitted");
        Ok(assessment)
    }

    /// Validator sign-off, forwarding the assessment to the final
    /// approver. Rejected while any indicator decision is still pending.
    pub async fn finalize(
        &self,
        actor: &ActorId,
        id: &AssessmentId,
    ) -> AssessmentResult<Assessment> {
        self.require_system_wide(actor)?;
        if !self.completeness.is_complete(id).await {
            return Err(AssessmentError::IncompleteSubmission);
        }

        let rows = self.store.list_indicators(id).await.map_err(storage_err)?;
        let pending = rows
            .iter()
            .filter(|r| r.validation_status == ValidationStatus::Pending)
            .count();
        if pending > 0 {
            return Err(AssessmentError::PendingDecisions { count: pending });
        }

        let (assessment, _) = self
            .mutate(id, |a| {
                let before = StatusSnapshot::of(a);
                a.finalize()?;
                let entry = self.recorder.entry(
                    actor,
                    AuditAction::Finalized,
                    AuditEntityType::Assessment,
                    a.id.to_string(),
                    &before,
                    &StatusSnapshot::of(a),
                );
                Ok((vec![entry], ()))
            })
            .await?;

        self.notifier.on_status_changed(id, assessment.status);
        tracing::info!(assessment_id = %id, "assessment finalized");
        Ok(assessment)
    }

    /// Open a targeted correction round for one approved area. The summary
    /// reference is requested up front and stored if it arrives in time;
    /// the round proceeds either way.
    pub async fn request_calibration(
        &self,
        actor: &ActorId,
        id: &AssessmentId,
        area_id: &AreaId,
    ) -> AssessmentResult<Assessment> {
        self.require_system_wide(actor)?;
        let summary_ref = self.summaries.request_summary(id, area_id).await;

        let (assessment, _) = self
            .mutate(id, |a| {
                let before = StatusSnapshot::of(a);
                a.request_calibration(area_id, actor.clone(), summary_ref.clone())?;
                let entry = self.recorder.entry(
                    actor,
                    AuditAction::CalibrationRequested,
                    AuditEntityType::Assessment,
                    a.id.to_string(),
                    &before,
                    &StatusSnapshot::of(a),
                );
                Ok((vec![entry], ()))
            })
            .await?;

        self.notifier.on_status_changed(id, assessment.status);
        tracing::info!(assessment_id = %id, area_id = %area_id, "calibration requested");
        Ok(assessment)
    }

    /// Resubmit one calibrated area. The resubmission routes back to the
    /// reviewer who requested the calibration, never to the general queue.
    pub async fn submit_for_calibration(
        &self,
        actor: &ActorId,
        id: &AssessmentId,
        area_id: &AreaId,
    ) -> AssessmentResult<Assessment> {
        self.require_submitting_unit(actor)?;

        let (assessment, requester) = self
            .mutate(id, |a| {
                let before = StatusSnapshot::of(a);
                let requester = a.submit_for_calibration(area_id)?;
                let entry = self.recorder.entry(
                    actor,
                    AuditAction::CalibrationSubmitted,
                    AuditEntityType::Assessment,
                    a.id.to_string(),
                    &before,
                    &StatusSnapshot::of(a),
                );
                Ok((vec![entry], requester))
            })
            .await?;

        self.notifier.on_calibration_resubmitted(id, area_id, &requester);
        if !assessment.is_calibration_rework {
            self.notifier.on_status_changed(id, assessment.status);
        }
        tracing::info!(
            assessment_id = %id,
            area_id = %area_id,
            requester = %requester,
            "calibration resubmitted"
        );
        Ok(assessment)
    }

    /// Final determination. Terminal; the assessment and its indicator
    /// rows are locked afterwards.
    pub async fn approve(
        &self,
        actor: &ActorId,
        id: &AssessmentId,
    ) -> AssessmentResult<Assessment> {
        self.require_final_approver(actor)?;

        let (assessment, _) = self
            .mutate(id, |a| {
                let before = StatusSnapshot::of(a);
                a.approve()?;
                let entry = self.recorder.entry(
                    actor,
                    AuditAction::AssessmentApproved,
                    AuditEntityType::Assessment,
                    a.id.to_string(),
                    &before,
                    &StatusSnapshot::of(a),
                );
                Ok((vec![entry], ()))
            })
            .await?;

        self.notifier.on_assessment_completed(id);
        tracing::info!(assessment_id = %id, "assessment completed");
        Ok(assessment)
    }

    /// Final-approver correction round reopening only the named
    /// requirements.
    pub async fn request_recalibration(
        &self,
        actor: &ActorId,
        id: &AssessmentId,
        targets: &[RequirementId],
    ) -> AssessmentResult<Assessment> {
        self.require_final_approver(actor)?;
        let limit = self.config.recalibration_limit;

        let (assessment, _) = self
            .mutate(id, |a| {
                let before = StatusSnapshot::of(a);
                a.request_recalibration(targets.iter().cloned(), limit)?;
                let entry = self.recorder.entry(
                    actor,
                    AuditAction::RecalibrationRequested,
                    AuditEntityType::Assessment,
                    a.id.to_string(),
                    &before,
                    &StatusSnapshot::of(a),
                );
                Ok((vec![entry], ()))
            })
            .await?;

        self.notifier.on_status_changed(id, assessment.status);
        tracing::info!(
            assessment_id = %id,
            targets = targets.len(),
            "re-calibration requested"
        );
        Ok(assessment)
    }

    /// Return a re-calibration rework straight back to the final approver.
    pub async fn submit_for_recalibration(
        &self,
        actor: &ActorId,
        id: &AssessmentId,
    ) -> AssessmentResult<Assessment> {
        self.require_submitting_unit(actor)?;

        let (assessment, _) = self
            .mutate(id, |a| {
                let before = StatusSnapshot::of(a);
                a.submit_for_recalibration()?;
                let entry = self.recorder.entry(
                    actor,
                    AuditAction::RecalibrationSubmitted,
                    AuditEntityType::Assessment,
                    a.id.to_string(),
                    &before,
                    &StatusSnapshot::of(a),
                );
                Ok((vec![entry], ()))
            })
            .await?;

        self.notifier.on_status_changed(id, assessment.status);
        tracing::info!(assessment_id = %id, "re-calibration resubmitted");
        Ok(assessment)
    }

    // ── Indicator operations ─────────────────────────────────────────

    async fn load_open_indicator(
        &self,
        response_id: &IndicatorResponseId,
    ) -> AssessmentResult<(IndicatorResponse, Assessment)> {
        let row = self
            .store
            .get_indicator(response_id)
            .await
            .map_err(storage_err)?;
        let assessment = self
            .store
            .load_assessment(&row.assessment_id)
            .await
            .map_err(storage_err)?;
        if assessment.status.is_terminal() {
            return Err(AssessmentError::invalid_transition(
                assessment.status,
                "update_indicator",
            ));
        }
        Ok((row, assessment))
    }

    /// Record a reviewer decision on one indicator. Fail and Considered
    /// decisions must be preceded by a public comment on the row. The
    /// decision never touches the checklist data underneath it.
    pub async fn save_validation(
        &self,
        actor: &ActorId,
        response_id: &IndicatorResponseId,
        status: ValidationStatus,
        is_manual_override: bool,
    ) -> AssessmentResult<IndicatorResponse> {
        let (mut row, _) = self.load_open_indicator(response_id).await?;
        self.require_indicator_reviewer(actor, &row.area_id)?;

        if status.requires_public_comment() && !row.has_public_comment() {
            return Err(AssessmentError::MissingRequiredComment {
                area: row.area_id.clone(),
            });
        }

        let before = row.clone();
        row.validation_status = status;
        row.is_manual_override = is_manual_override;
        row.requires_rework = status == ValidationStatus::Fail;
        row.updated_at = chrono::Utc::now();

        let entry = self.recorder.entry(
            actor,
            AuditAction::ValidationSaved,
            AuditEntityType::IndicatorResponse,
            row.id.to_string(),
            &before,
            &row,
        );
        self.store
            .update_indicator(row.clone(), vec![entry])
            .await
            .map_err(storage_err)?;

        tracing::info!(
            response_id = %response_id,
            status = ?status,
            manual_override = is_manual_override,
            "validation saved"
        );
        Ok(row)
    }

    /// Flag one indicator as a calibration candidate and hand remarks to
    /// the next reviewer in the chain. The validator reads these flags
    /// when deciding which areas to calibrate.
    pub async fn flag_for_calibration(
        &self,
        actor: &ActorId,
        response_id: &IndicatorResponseId,
        flagged: bool,
        remarks: Option<String>,
    ) -> AssessmentResult<IndicatorResponse> {
        let (mut row, _) = self.load_open_indicator(response_id).await?;
        self.require_indicator_reviewer(actor, &row.area_id)?;

        let before = row.clone();
        row.flagged_for_calibration = flagged;
        row.remarks_for_next_reviewer = remarks;
        row.updated_at = chrono::Utc::now();

        let entry = self.recorder.entry(
            actor,
            AuditAction::CalibrationFlagged,
            AuditEntityType::IndicatorResponse,
            row.id.to_string(),
            &before,
            &row,
        );
        self.store
            .update_indicator(row.clone(), vec![entry])
            .await
            .map_err(storage_err)?;

        tracing::info!(
            response_id = %response_id,
            flagged,
            "calibration flag saved"
        );
        Ok(row)
    }

    /// Append a comment to an indicator row.
    pub async fn add_comment(
        &self,
        actor: &ActorId,
        response_id: &IndicatorResponseId,
        text: &str,
        visibility: CommentVisibility,
    ) -> AssessmentResult<IndicatorResponse> {
        let (mut row, _) = self.load_open_indicator(response_id).await?;
        // Commenting is open to every known actor, including the
        // submitting unit.
        self.scope_of(actor)?;

        let before = row.clone();
        row.add_comment(text, visibility, actor.clone());

        let entry = self.recorder.entry(
            actor,
            AuditAction::CommentAdded,
            AuditEntityType::IndicatorResponse,
            row.id.to_string(),
            &before,
            &row,
        );
        self.store
            .update_indicator(row.clone(), vec![entry])
            .await
            .map_err(storage_err)?;
        Ok(row)
    }

    /// Replace the checklist answers on one indicator row. Only the
    /// submitting unit may write answers, and only while the requirement
    /// is unlocked by the current lifecycle stage.
    pub async fn save_checklist_data(
        &self,
        actor: &ActorId,
        response_id: &IndicatorResponseId,
        data: BTreeMap<String, Value>,
    ) -> AssessmentResult<IndicatorResponse> {
        self.require_submitting_unit(actor)?;
        let (mut row, assessment) = self.load_open_indicator(response_id).await?;

        if !is_requirement_unlocked(&assessment, &row.area_id, &row.requirement_id) {
            return Err(AssessmentError::invalid_transition(
                assessment.status,
                "save_checklist_data",
            ));
        }

        let before = row.clone();
        row.checklist_data = data;
        row.updated_at = chrono::Utc::now();

        let entry = self.recorder.entry(
            actor,
            AuditAction::ChecklistSaved,
            AuditEntityType::IndicatorResponse,
            row.id.to_string(),
            &before,
            &row,
        );
        self.store
            .update_indicator(row.clone(), vec![entry])
            .await
            .map_err(storage_err)?;
        Ok(row)
    }

    /// Evaluate one indicator's stored answers against a checklist schema.
    /// Advisory only; the reviewer decides what to save.
    pub async fn evaluate_response(
        &self,
        response_id: &IndicatorResponseId,
        schema: &ChecklistSchema,
    ) -> AssessmentResult<Evaluation> {
        let row = self
            .store
            .get_indicator(response_id)
            .await
            .map_err(storage_err)?;
        Ok(evaluate(schema, &row.checklist_data))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub async fn get_assessment(&self, id: &AssessmentId) -> AssessmentResult<Assessment> {
        self.store.load_assessment(id).await.map_err(storage_err)
    }

    pub async fn list_indicators(
        &self,
        id: &AssessmentId,
    ) -> AssessmentResult<Vec<IndicatorResponse>> {
        self.store.list_indicators(id).await.map_err(storage_err)
    }

    /// Audit entries matching the filters, newest first.
    pub async fn audit_trail(
        &self,
        query: &AuditQuery,
        page: Page,
    ) -> AssessmentResult<Vec<AuditLogEntry>> {
        self.store.list_audit(query, page).await.map_err(storage_err)
    }
}

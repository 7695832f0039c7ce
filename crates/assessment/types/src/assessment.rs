//! The assessment aggregate: global status, per-area approval sub-state,
//! and the rework/calibration bookkeeping.
//!
//! Transition methods are pure guard-then-mutate operations returning a
//! typed error on violation. The engine decides when to call them and
//! commits the mutated aggregate atomically with its audit entries; nothing
//! here touches storage.

use crate::{
    ActorId, AreaId, AssessmentError, AssessmentId, AssessmentResult, CycleId, RequirementId,
    ReworkPolicy, SummaryRef, UnitId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ── Status enums ─────────────────────────────────────────────────────

/// Global lifecycle status of an assessment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AssessmentStatus {
    /// Being filled in by the submitting unit.
    #[default]
    Draft,
    /// Submitted and waiting in the review queue.
    Submitted,
    /// At least one area reviewer has started work.
    InReview,
    /// Returned to the submitting unit for correction.
    Rework,
    /// Every governance area approved; awaiting the system-wide validator.
    AwaitingFinalValidation,
    /// Validator signed off; awaiting the final approver.
    AwaitingFinalApproval,
    /// Final determination issued. Terminal.
    Completed,
}

impl AssessmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::InReview => "in_review",
            Self::Rework => "rework",
            Self::AwaitingFinalValidation => "awaiting_final_validation",
            Self::AwaitingFinalApproval => "awaiting_final_approval",
            Self::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

/// Sub-state of one governance area within an assessment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AreaStatus {
    #[default]
    Draft,
    Submitted,
    InReview,
    Rework,
    Approved,
}

impl std::fmt::Display for AreaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::InReview => "in_review",
            Self::Rework => "rework",
            Self::Approved => "approved",
        };
        write!(f, "{}", s)
    }
}

// ── Per-area approval state ──────────────────────────────────────────

/// Approval sub-state for one governance area.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AreaApproval {
    pub area_id: AreaId,
    pub status: AreaStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<ActorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    /// Set when this area triggers a rework round; under the per-area
    /// rework policy this flag is the guard instead of the global one.
    pub rework_used: bool,
}

impl AreaApproval {
    pub fn new(area_id: AreaId) -> Self {
        Self {
            area_id,
            status: AreaStatus::Draft,
            approver_id: None,
            approved_at: None,
            rework_used: false,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == AreaStatus::Approved
    }
}

// ── Calibration requests ─────────────────────────────────────────────

/// A targeted per-area correction round requested by the validator after
/// area-level approval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRequest {
    pub area_id: AreaId,
    pub requested_by: ActorId,
    pub requested_at: DateTime<Utc>,
    /// Reference to an externally generated explanation; may never arrive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_ref: Option<SummaryRef>,
    /// True once the resubmission for this request has been accepted.
    pub resolved: bool,
}

// ── The aggregate ────────────────────────────────────────────────────

/// One submission cycle for one submitting unit in one assessment period.
///
/// `version` is the optimistic-concurrency token: the store rejects a
/// commit whose expected version does not match the persisted one, so two
/// racing transitions resolve to exactly one winner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub cycle_id: CycleId,
    pub unit_id: UnitId,
    pub status: AssessmentStatus,
    pub version: u64,
    /// Set the first time any area triggers rework; under the global
    /// rework policy every later request is rejected.
    pub rework_round_used: bool,
    /// Areas that have consumed their one calibration round.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub calibrated_area_ids: BTreeSet<AreaId>,
    /// Calibrations in flight; several areas may calibrate concurrently.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_calibrations: Vec<CalibrationRequest>,
    pub is_calibration_rework: bool,
    pub is_final_approver_recalibration: bool,
    pub final_approver_recalibration_count: u32,
    /// Requirements reopened by the current re-calibration round.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub recalibration_targets: BTreeSet<RequirementId>,
    /// Exactly one entry per governance area in the cycle's catalog.
    pub area_states: BTreeMap<AreaId, AreaApproval>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Assessment {
    /// Create a draft assessment with one `Draft` area entry per
    /// configured governance area.
    pub fn new(cycle_id: CycleId, unit_id: UnitId, areas: &[AreaId]) -> Self {
        let now = Utc::now();
        let area_states = areas
            .iter()
            .map(|a| (a.clone(), AreaApproval::new(a.clone())))
            .collect();
        Self {
            id: AssessmentId::generate(),
            cycle_id,
            unit_id,
            status: AssessmentStatus::Draft,
            version: 0,
            rework_round_used: false,
            calibrated_area_ids: BTreeSet::new(),
            pending_calibrations: Vec::new(),
            is_calibration_rework: false,
            is_final_approver_recalibration: false,
            final_approver_recalibration_count: 0,
            recalibration_targets: BTreeSet::new(),
            area_states,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            finalized_at: None,
            completed_at: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn all_areas_approved(&self) -> bool {
        !self.area_states.is_empty() && self.area_states.values().all(AreaApproval::is_approved)
    }

    pub fn area(&self, area_id: &AreaId) -> AssessmentResult<&AreaApproval> {
        self.area_states
            .get(area_id)
            .ok_or_else(|| AssessmentError::UnknownArea {
                area: area_id.clone(),
            })
    }

    pub fn area_mut(&mut self, area_id: &AreaId) -> AssessmentResult<&mut AreaApproval> {
        self.area_states
            .get_mut(area_id)
            .ok_or_else(|| AssessmentError::UnknownArea {
                area: area_id.clone(),
            })
    }

    /// Calibration request for `area_id` that has not been resolved yet.
    pub fn open_calibration(&self, area_id: &AreaId) -> Option<&CalibrationRequest> {
        self.pending_calibrations
            .iter()
            .find(|c| &c.area_id == area_id && !c.resolved)
    }

    fn ensure_mutable(&self, action: &str) -> AssessmentResult<()> {
        if self.status.is_terminal() {
            return Err(AssessmentError::invalid_transition(self.status, action));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // ── Submission ───────────────────────────────────────────────────

    /// Draft -> Submitted. The completeness oracle is consulted by the
    /// engine before this is called.
    pub fn submit(&mut self) -> AssessmentResult<()> {
        if self.status != AssessmentStatus::Draft {
            return Err(AssessmentError::invalid_transition(self.status, "submit"));
        }
        self.status = AssessmentStatus::Submitted;
        self.submitted_at = Some(Utc::now());
        for area in self.area_states.values_mut() {
            area.status = AreaStatus::Submitted;
        }
        self.touch();
        Ok(())
    }

    /// Rework -> Submitted after the submitting unit corrects a plain
    /// rework round. Calibration and re-calibration rework have their own
    /// return edges.
    pub fn resubmit(&mut self) -> AssessmentResult<()> {
        if self.status != AssessmentStatus::Rework
            || self.is_calibration_rework
            || self.is_final_approver_recalibration
        {
            return Err(AssessmentError::invalid_transition(self.status, "resubmit"));
        }
        self.status = AssessmentStatus::Submitted;
        for area in self.area_states.values_mut() {
            if area.status == AreaStatus::Rework {
                area.status = AreaStatus::Submitted;
            }
        }
        self.touch();
        Ok(())
    }

    // ── Area review sub-state ────────────────────────────────────────

    /// Area Submitted -> InReview; the first area to enter review also
    /// moves the assessment from Submitted to InReview.
    pub fn begin_area_review(&mut self, area_id: &AreaId) -> AssessmentResult<()> {
        self.ensure_mutable("begin_area_review")?;
        if !matches!(
            self.status,
            AssessmentStatus::Submitted | AssessmentStatus::InReview
        ) {
            return Err(AssessmentError::invalid_transition(
                self.status,
                "begin_area_review",
            ));
        }
        let area = self.area_mut(area_id)?;
        if area.status != AreaStatus::Submitted {
            return Err(AssessmentError::invalid_transition(
                area.status,
                "begin_area_review",
            ));
        }
        area.status = AreaStatus::InReview;
        if self.status == AssessmentStatus::Submitted {
            self.status = AssessmentStatus::InReview;
        }
        self.touch();
        Ok(())
    }

    /// Area {Submitted, InReview} -> Approved. Returns `true` when this
    /// approval was the last one and the assessment moved to
    /// AwaitingFinalValidation. The aggregate condition is re-checked on
    /// every approval, not just the expected last one, because approvals
    /// from different reviewers race.
    pub fn approve_area(&mut self, area_id: &AreaId, actor: &ActorId) -> AssessmentResult<bool> {
        self.ensure_mutable("approve_area")?;
        if !matches!(
            self.status,
            AssessmentStatus::Submitted | AssessmentStatus::InReview
        ) {
            return Err(AssessmentError::invalid_transition(
                self.status,
                "approve_area",
            ));
        }
        let area = self.area_mut(area_id)?;
        if !matches!(area.status, AreaStatus::Submitted | AreaStatus::InReview) {
            return Err(AssessmentError::invalid_transition(
                area.status,
                "approve_area",
            ));
        }
        area.status = AreaStatus::Approved;
        area.approver_id = Some(actor.clone());
        area.approved_at = Some(Utc::now());

        let transitioned = self.all_areas_approved();
        if transitioned {
            self.status = AssessmentStatus::AwaitingFinalValidation;
        }
        self.touch();
        Ok(transitioned)
    }

    /// Send one area (and therefore the whole assessment) back for rework.
    ///
    /// The guard depends on the configured policy: one global round per
    /// assessment, or one round per area. Both flags are maintained either
    /// way so the policy can flip without a schema change.
    pub fn request_area_rework(
        &mut self,
        area_id: &AreaId,
        policy: ReworkPolicy,
    ) -> AssessmentResult<()> {
        self.ensure_mutable("request_area_rework")?;
        if !matches!(
            self.status,
            AssessmentStatus::Submitted | AssessmentStatus::InReview | AssessmentStatus::Rework
        ) {
            return Err(AssessmentError::invalid_transition(
                self.status,
                "request_area_rework",
            ));
        }
        match policy {
            ReworkPolicy::GlobalSingleRound => {
                if self.rework_round_used {
                    return Err(AssessmentError::ReworkLimitReached);
                }
            }
            ReworkPolicy::PerAreaSingleRound => {
                if self.area(area_id)?.rework_used {
                    return Err(AssessmentError::ReworkLimitReached);
                }
            }
        }
        let area = self.area_mut(area_id)?;
        if !matches!(area.status, AreaStatus::Submitted | AreaStatus::InReview) {
            return Err(AssessmentError::invalid_transition(
                area.status,
                "request_area_rework",
            ));
        }
        area.status = AreaStatus::Rework;
        area.rework_used = true;
        self.rework_round_used = true;
        self.status = AssessmentStatus::Rework;
        self.touch();
        Ok(())
    }

    // ── Final validation and calibration ─────────────────────────────

    /// AwaitingFinalValidation -> AwaitingFinalApproval. The engine checks
    /// that no indicator is still Pending before calling this.
    pub fn finalize(&mut self) -> AssessmentResult<()> {
        if self.status != AssessmentStatus::AwaitingFinalValidation {
            return Err(AssessmentError::invalid_transition(self.status, "finalize"));
        }
        self.status = AssessmentStatus::AwaitingFinalApproval;
        self.finalized_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Open a calibration round for one already-approved area. Each area
    /// may be calibrated at most once per assessment; the allowance is
    /// consumed at request time.
    pub fn request_calibration(
        &mut self,
        area_id: &AreaId,
        requested_by: ActorId,
        summary_ref: Option<SummaryRef>,
    ) -> AssessmentResult<()> {
        if self.status != AssessmentStatus::AwaitingFinalValidation
            && !(self.status == AssessmentStatus::Rework && self.is_calibration_rework)
        {
            return Err(AssessmentError::invalid_transition(
                self.status,
                "request_calibration",
            ));
        }
        if self.calibrated_area_ids.contains(area_id) {
            return Err(AssessmentError::CalibrationLimitReached {
                area: area_id.clone(),
            });
        }
        let area = self.area_mut(area_id)?;
        if area.status != AreaStatus::Approved {
            return Err(AssessmentError::invalid_transition(
                area.status,
                "request_calibration",
            ));
        }
        area.status = AreaStatus::Rework;
        self.calibrated_area_ids.insert(area_id.clone());
        self.pending_calibrations.push(CalibrationRequest {
            area_id: area_id.clone(),
            requested_by,
            requested_at: Utc::now(),
            summary_ref,
            resolved: false,
        });
        self.status = AssessmentStatus::Rework;
        self.is_calibration_rework = true;
        self.touch();
        Ok(())
    }

    /// Resubmit one calibrated area. The resubmission routes back to the
    /// reviewer who requested the calibration (returned here), never to
    /// the general queue. The assessment returns to
    /// AwaitingFinalValidation only once no calibration remains open.
    pub fn submit_for_calibration(&mut self, area_id: &AreaId) -> AssessmentResult<ActorId> {
        if self.status != AssessmentStatus::Rework || !self.is_calibration_rework {
            return Err(AssessmentError::invalid_transition(
                self.status,
                "submit_for_calibration",
            ));
        }
        let request = self
            .pending_calibrations
            .iter_mut()
            .find(|c| &c.area_id == area_id && !c.resolved)
            .ok_or_else(|| {
                AssessmentError::NotFound(format!("no open calibration for area {}", area_id))
            })?;
        request.resolved = true;
        let requester = request.requested_by.clone();

        // The area was approved before calibration opened; restore it.
        let area = self.area_mut(area_id)?;
        area.status = AreaStatus::Approved;

        if self.pending_calibrations.iter().all(|c| c.resolved) {
            self.status = AssessmentStatus::AwaitingFinalValidation;
            self.is_calibration_rework = false;
        }
        self.touch();
        Ok(requester)
    }

    // ── Final approval and re-calibration ────────────────────────────

    /// AwaitingFinalApproval -> Completed. Terminal; the aggregate and its
    /// indicator rows are locked afterwards.
    pub fn approve(&mut self) -> AssessmentResult<()> {
        if self.status != AssessmentStatus::AwaitingFinalApproval {
            return Err(AssessmentError::invalid_transition(self.status, "approve"));
        }
        self.status = AssessmentStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Final-approver correction round: reopens only the named
    /// requirements, bounded by `limit` rounds per assessment.
    pub fn request_recalibration(
        &mut self,
        targets: impl IntoIterator<Item = RequirementId>,
        limit: u32,
    ) -> AssessmentResult<()> {
        if self.status != AssessmentStatus::AwaitingFinalApproval {
            return Err(AssessmentError::invalid_transition(
                self.status,
                "request_recalibration",
            ));
        }
        if self.final_approver_recalibration_count >= limit {
            return Err(AssessmentError::RecalibrationLimitReached);
        }
        self.final_approver_recalibration_count += 1;
        self.is_final_approver_recalibration = true;
        self.recalibration_targets = targets.into_iter().collect();
        self.status = AssessmentStatus::Rework;
        self.touch();
        Ok(())
    }

    /// Return a re-calibration rework to the final approver. The validator
    /// already signed off, so this goes straight back to
    /// AwaitingFinalApproval.
    pub fn submit_for_recalibration(&mut self) -> AssessmentResult<()> {
        if self.status != AssessmentStatus::Rework || !self.is_final_approver_recalibration {
            return Err(AssessmentError::invalid_transition(
                self.status,
                "submit_for_recalibration",
            ));
        }
        self.status = AssessmentStatus::AwaitingFinalApproval;
        self.is_final_approver_recalibration = false;
        self.recalibration_targets.clear();
        self.touch();
        Ok(())
    }
}

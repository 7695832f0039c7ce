//! Indicator responses: one requirement's answer sheet within an assessment.

use crate::{ActorId, AreaId, AssessmentId, IndicatorResponseId, RequirementId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Review outcome for a single requirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValidationStatus {
    /// No reviewer decision yet.
    #[default]
    Pending,
    Pass,
    Fail,
    /// Compliant only through a grace window; counts as Pass downstream but
    /// is surfaced distinctly to reviewers.
    Considered,
}

impl ValidationStatus {
    /// Pass-equivalent for aggregation purposes.
    pub fn is_passing(&self) -> bool {
        matches!(self, Self::Pass | Self::Considered)
    }

    /// Decisions in these statuses must carry a public explanation.
    pub fn requires_public_comment(&self) -> bool {
        matches!(self, Self::Fail | Self::Considered)
    }
}

/// Who may read a reviewer comment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentVisibility {
    /// Visible to the submitting unit.
    Public,
    /// Visible to reviewers only.
    InternalToReviewers,
}

/// One remark on an indicator response, ordered by creation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub visibility: CommentVisibility,
    pub author_id: ActorId,
    pub created_at: DateTime<Utc>,
}

/// One requirement's response within an assessment.
///
/// Created alongside the assessment from the cycle's requirement catalog,
/// mutated by reviewers at any review stage, and locked once the parent
/// assessment completes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResponse {
    pub id: IndicatorResponseId,
    pub assessment_id: AssessmentId,
    pub requirement_id: RequirementId,
    /// Governance area the requirement belongs to per the catalog.
    pub area_id: AreaId,
    /// Raw checklist answers keyed by item key.
    #[serde(default)]
    pub checklist_data: BTreeMap<String, serde_json::Value>,
    pub validation_status: ValidationStatus,
    /// True when a reviewer overrode the evaluator's recommendation.
    pub is_manual_override: bool,
    pub requires_rework: bool,
    pub flagged_for_calibration: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks_for_next_reviewer: Option<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub updated_at: DateTime<Utc>,
}

impl IndicatorResponse {
    pub fn new(
        assessment_id: AssessmentId,
        requirement_id: RequirementId,
        area_id: AreaId,
    ) -> Self {
        Self {
            id: IndicatorResponseId::generate(),
            assessment_id,
            requirement_id,
            area_id,
            checklist_data: BTreeMap::new(),
            validation_status: ValidationStatus::Pending,
            is_manual_override: false,
            requires_rework: false,
            flagged_for_calibration: false,
            remarks_for_next_reviewer: None,
            comments: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Append a comment, preserving arrival order.
    pub fn add_comment(
        &mut self,
        text: impl Into<String>,
        visibility: CommentVisibility,
        author_id: ActorId,
    ) {
        self.comments.push(Comment {
            text: text.into(),
            visibility,
            author_id,
            created_at: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    /// Whether any non-empty comment is visible to the submitting unit.
    pub fn has_public_comment(&self) -> bool {
        self.comments
            .iter()
            .any(|c| c.visibility == CommentVisibility::Public && !c.text.trim().is_empty())
    }
}

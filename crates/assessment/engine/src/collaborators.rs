//! External collaborator seams.
//!
//! The engine treats completeness checking, summary generation, reviewer
//! assignment, and notification delivery as opaque services behind traits.
//! Simple fixed implementations are provided for wiring and tests.

use assessment_types::{ActorId, AreaId, AssessmentId, AssessmentStatus, SummaryRef};
use async_trait::async_trait;
use std::collections::HashMap;

/// Answers whether an assessment has every requirement answered.
#[async_trait]
pub trait CompletenessChecker: Send + Sync {
    async fn is_complete(&self, assessment_id: &AssessmentId) -> bool;
}

/// Requests a human-readable explanation for a correction round.
///
/// Generation happens elsewhere and may never finish; the engine stores
/// only the returned reference and tolerates its absence.
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn request_summary(
        &self,
        assessment_id: &AssessmentId,
        area_id: &AreaId,
    ) -> Option<SummaryRef>;
}

/// Fire-and-forget callbacks after successful transitions.
///
/// Implementations must absorb their own failures; the engine calls these
/// strictly after the commit and never rolls back on their account.
pub trait NotificationSink: Send + Sync {
    fn on_area_approved(&self, _assessment_id: &AssessmentId, _area_id: &AreaId) {}
    fn on_status_changed(&self, _assessment_id: &AssessmentId, _status: AssessmentStatus) {}
    fn on_calibration_resubmitted(
        &self,
        _assessment_id: &AssessmentId,
        _area_id: &AreaId,
        _requester: &ActorId,
    ) {
    }
    fn on_assessment_completed(&self, _assessment_id: &AssessmentId) {}
}

/// What an actor is allowed to act on.
///
/// Reviewer-to-area binding is a lookup, not a hard-coded role name, so
/// assignments can be reconfigured without touching the state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReviewerScope {
    /// The submitting unit: fills in checklists, submits, resubmits.
    SubmittingUnit,
    /// Designated reviewer for exactly one governance area.
    Area(AreaId),
    /// System-wide validator: finalizes and requests calibrations.
    SystemWide,
    /// Final approver: completes and requests re-calibrations.
    FinalApprover,
}

/// Resolves an actor to their current scope.
pub trait ReviewerDirectory: Send + Sync {
    fn scope(&self, actor: &ActorId) -> Option<ReviewerScope>;
}

// ── Fixed implementations ────────────────────────────────────────────

/// Completeness oracle with a fixed answer.
pub struct FixedCompleteness(pub bool);

#[async_trait]
impl CompletenessChecker for FixedCompleteness {
    async fn is_complete(&self, _assessment_id: &AssessmentId) -> bool {
        self.0
    }
}

/// Summary generator that never produces a reference.
pub struct NoSummaries;

#[async_trait]
impl SummaryGenerator for NoSummaries {
    async fn request_summary(
        &self,
        _assessment_id: &AssessmentId,
        _area_id: &AreaId,
    ) -> Option<SummaryRef> {
        None
    }
}

/// Notification sink that drops everything.
pub struct NullNotifier;

impl NotificationSink for NullNotifier {}

/// Static actor-to-scope table.
#[derive(Default)]
pub struct StaticDirectory {
    scopes: HashMap<ActorId, ReviewerScope>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, actor: impl Into<String>, scope: ReviewerScope) -> Self {
        self.scopes.insert(ActorId::new(actor), scope);
        self
    }
}

impl ReviewerDirectory for StaticDirectory {
    fn scope(&self, actor: &ActorId) -> Option<ReviewerScope> {
        self.scopes.get(actor).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_directory_lookup() {
        let directory = StaticDirectory::new()
            .with("assessor-3", ReviewerScope::Area(AreaId::new("area-3")))
            .with("validator-1", ReviewerScope::SystemWide);

        assert_eq!(
            directory.scope(&ActorId::new("assessor-3")),
            Some(ReviewerScope::Area(AreaId::new("area-3")))
        );
        assert_eq!(
            directory.scope(&ActorId::new("validator-1")),
            Some(ReviewerScope::SystemWide)
        );
        assert_eq!(directory.scope(&ActorId::new("stranger")), None);
    }

    #[tokio::test]
    async fn test_fixed_completeness() {
        let oracle = FixedCompleteness(false);
        assert!(!oracle.is_complete(&AssessmentId::new("a-1")).await);
    }
}

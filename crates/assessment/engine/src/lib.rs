//! Review orchestration for governance assessments.
//!
//! Ties the aggregate state machine, the indicator rows, and the audit
//! trail together behind one engine: scope checks first, guarded
//! transition second, atomic commit of the mutated aggregate plus its
//! audit entries last. Collaborating services (completeness checking,
//! summary generation, reviewer assignment, notifications) sit behind
//! traits in [`collaborators`].

#![deny(unsafe_code)]

mod collaborators;
mod engine;
mod snapshot;
mod tracker;
mod unlock;

pub use collaborators::{
    CompletenessChecker, FixedCompleteness, NoSummaries, NotificationSink, NullNotifier,
    ReviewerDirectory, ReviewerScope, StaticDirectory, SummaryGenerator,
};
pub use engine::{AssessmentEngine, CatalogEntry};
pub use tracker::{AreaApprovalOutcome, AreaTracker};
pub use unlock::is_requirement_unlocked;

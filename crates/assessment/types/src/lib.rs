//! Domain types for the assessment review platform.
//!
//! The aggregate here is the [`Assessment`]: global lifecycle status plus
//! one approval sub-state per governance area, with rework, calibration,
//! and re-calibration bookkeeping. Transition methods are pure and return
//! typed errors; persistence and coordination live in the storage and
//! engine crates.

#![deny(unsafe_code)]

mod assessment;
mod audit;
mod checklist;
mod config;
mod error;
mod id;
mod indicator;

pub use assessment::{
    AreaApproval, AreaStatus, Assessment, AssessmentStatus, CalibrationRequest,
};
pub use audit::{AuditAction, AuditEntityType, AuditLogEntry};
pub use checklist::{ChecklistItem, ChecklistSchema, OptionGroup, ValidationRule};
pub use config::{EngineConfig, ReworkPolicy};
pub use error::{AssessmentError, AssessmentResult};
pub use id::{
    ActorId, AreaId, AssessmentId, AuditEntryId, CycleId, IndicatorResponseId, RequirementId,
    SummaryRef, UnitId,
};
pub use indicator::{Comment, CommentVisibility, IndicatorResponse, ValidationStatus};

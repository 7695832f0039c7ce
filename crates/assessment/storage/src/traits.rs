use crate::StorageResult;
use assessment_types::{
    Assessment, AssessmentId, AuditAction, AuditEntityType, AuditLogEntry, IndicatorResponse,
    IndicatorResponseId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Generic query window for paged reads. A zero limit means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

/// Filters for audit log queries. Every field is optional; an empty query
/// matches everything.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub actor_id: Option<assessment_types::ActorId>,
    pub entity_type: Option<AuditEntityType>,
    pub action: Option<AuditAction>,
}

impl AuditQuery {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(from) = self.from {
            if entry.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.timestamp > to {
                return false;
            }
        }
        if let Some(ref actor) = self.actor_id {
            if &entry.actor_id != actor {
                return false;
            }
        }
        if let Some(entity_type) = self.entity_type {
            if entry.entity_type != entity_type {
                return false;
            }
        }
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }
        true
    }
}

/// Storage interface for the assessment aggregate and its indicator rows.
///
/// The aggregate (global status plus the embedded area map) is the unit of
/// optimistic locking: `commit_assessment` persists the mutated aggregate
/// and its audit entries atomically, or rejects the whole write on a
/// version mismatch. A read of the aggregate is always consistent with a
/// read of all its area states as of the same commit.
///
/// Indicator rows update independently of the aggregate version; any write
/// that can trigger a status transition must go through the aggregate
/// commit instead.
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Persist a new aggregate together with its creation audit entries.
    async fn insert_assessment(
        &self,
        assessment: Assessment,
        entries: Vec<AuditLogEntry>,
    ) -> StorageResult<()>;

    /// Load the current aggregate, version included.
    async fn load_assessment(&self, id: &AssessmentId) -> StorageResult<Assessment>;

    /// Commit a mutated aggregate plus its audit entries in one atomic
    /// unit. Fails with `VersionConflict` when the persisted version no
    /// longer equals `expected_version`; nothing is written in that case.
    async fn commit_assessment(
        &self,
        assessment: Assessment,
        expected_version: u64,
        entries: Vec<AuditLogEntry>,
    ) -> StorageResult<()>;

    async fn insert_indicator(&self, row: IndicatorResponse) -> StorageResult<()>;

    async fn get_indicator(&self, id: &IndicatorResponseId) -> StorageResult<IndicatorResponse>;

    /// Replace an indicator row and append its audit entries atomically.
    async fn update_indicator(
        &self,
        row: IndicatorResponse,
        entries: Vec<AuditLogEntry>,
    ) -> StorageResult<()>;

    async fn list_indicators(
        &self,
        assessment_id: &AssessmentId,
    ) -> StorageResult<Vec<IndicatorResponse>>;
}

/// Storage interface for the append-only audit log.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Read entries newest-first. Never mutates or deletes.
    async fn list_audit(&self, query: &AuditQuery, page: Page) -> StorageResult<Vec<AuditLogEntry>>;
}

/// Unified store bundle the engine works against.
pub trait ReviewStore: AssessmentStore + AuditStore + Send + Sync {}

impl<T> ReviewStore for T where T: AssessmentStore + AuditStore + Send + Sync {}

//! Audit recorder: immutable before/after records for every state-changing
//! action.
//!
//! The recorder builds entries; it does not persist them. The engine hands
//! entries to the storage commit so the mutation and its audit trail land
//! in the same atomic unit. A mutation without its entry, or an entry
//! without its mutation, is an integrity violation, and the storage
//! contract rules both out.

#![deny(unsafe_code)]

mod diff;

pub use diff::structural_diff;

use assessment_storage::{AuditQuery, AuditStore, Page, StorageResult};
use assessment_types::{
    ActorId, AuditAction, AuditEntityType, AuditEntryId, AuditLogEntry,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Builds audit entries from before/after snapshots.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuditRecorder;

impl AuditRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Build one entry, reducing the snapshots to their changed keys.
    pub fn entry<T: Serialize>(
        &self,
        actor_id: &ActorId,
        action: AuditAction,
        entity_type: AuditEntityType,
        entity_id: impl Into<String>,
        before: &T,
        after: &T,
    ) -> AuditLogEntry {
        let before = serde_json::to_value(before).unwrap_or(serde_json::Value::Null);
        let after = serde_json::to_value(after).unwrap_or(serde_json::Value::Null);
        let (before, after) = structural_diff(&before, &after);
        AuditLogEntry {
            id: AuditEntryId::generate(),
            actor_id: actor_id.clone(),
            timestamp: Utc::now(),
            action,
            entity_type,
            entity_id: entity_id.into(),
            before,
            after,
        }
    }
}

/// Read-only query facade over the append-only audit log.
pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Entries matching the filters, newest first.
    pub async fn list(&self, query: &AuditQuery, page: Page) -> StorageResult<Vec<AuditLogEntry>> {
        self.store.list_audit(query, page).await
    }
}

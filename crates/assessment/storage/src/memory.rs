//! In-memory reference implementation of the storage traits.
//!
//! Deterministic and test-friendly. Production deployments should use a
//! transactional backend for source-of-truth data; the commit contract
//! here (version check, then aggregate plus audit entries as one unit)
//! maps directly onto a database transaction with a row version column.

use crate::traits::{AssessmentStore, AuditQuery, AuditStore, Page};
use crate::{StorageError, StorageResult};
use assessment_types::{
    Assessment, AssessmentId, AuditLogEntry, IndicatorResponse, IndicatorResponseId,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory review store.
#[derive(Default)]
pub struct InMemoryReviewStore {
    assessments: RwLock<HashMap<AssessmentId, Assessment>>,
    indicators: RwLock<HashMap<IndicatorResponseId, IndicatorResponse>>,
    audit: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_page<T>(mut values: Vec<T>, page: Page) -> Vec<T> {
    if page.offset > 0 {
        values = values.into_iter().skip(page.offset).collect();
    }
    if page.limit > 0 {
        values.truncate(page.limit);
    }
    values
}

#[async_trait]
impl AssessmentStore for InMemoryReviewStore {
    async fn insert_assessment(
        &self,
        assessment: Assessment,
        entries: Vec<AuditLogEntry>,
    ) -> StorageResult<()> {
        let mut assessments = self
            .assessments
            .write()
            .map_err(|_| StorageError::Backend("assessments lock poisoned".to_string()))?;
        let mut audit = self
            .audit
            .write()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;

        if assessments.contains_key(&assessment.id) {
            return Err(StorageError::Conflict(format!(
                "assessment {} already exists",
                assessment.id
            )));
        }
        assessments.insert(assessment.id.clone(), assessment);
        audit.extend(entries);
        Ok(())
    }

    async fn load_assessment(&self, id: &AssessmentId) -> StorageResult<Assessment> {
        let assessments = self
            .assessments
            .read()
            .map_err(|_| StorageError::Backend("assessments lock poisoned".to_string()))?;
        assessments
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("assessment {} not found", id)))
    }

    async fn commit_assessment(
        &self,
        mut assessment: Assessment,
        expected_version: u64,
        entries: Vec<AuditLogEntry>,
    ) -> StorageResult<()> {
        // Both locks are held for the whole commit so the aggregate and its
        // audit entries become visible together or not at all.
        let mut assessments = self
            .assessments
            .write()
            .map_err(|_| StorageError::Backend("assessments lock poisoned".to_string()))?;
        let mut audit = self
            .audit
            .write()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;

        let current = assessments.get(&assessment.id).ok_or_else(|| {
            StorageError::NotFound(format!("assessment {} not found", assessment.id))
        })?;
        if current.version != expected_version {
            return Err(StorageError::VersionConflict {
                expected: expected_version,
                found: current.version,
            });
        }

        assessment.version = expected_version + 1;
        assessments.insert(assessment.id.clone(), assessment);
        audit.extend(entries);
        Ok(())
    }

    async fn insert_indicator(&self, row: IndicatorResponse) -> StorageResult<()> {
        let mut indicators = self
            .indicators
            .write()
            .map_err(|_| StorageError::Backend("indicators lock poisoned".to_string()))?;
        if indicators.contains_key(&row.id) {
            return Err(StorageError::Conflict(format!(
                "indicator {} already exists",
                row.id
            )));
        }
        indicators.insert(row.id.clone(), row);
        Ok(())
    }

    async fn get_indicator(&self, id: &IndicatorResponseId) -> StorageResult<IndicatorResponse> {
        let indicators = self
            .indicators
            .read()
            .map_err(|_| StorageError::Backend("indicators lock poisoned".to_string()))?;
        indicators
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("indicator {} not found", id)))
    }

    async fn update_indicator(
        &self,
        row: IndicatorResponse,
        entries: Vec<AuditLogEntry>,
    ) -> StorageResult<()> {
        let mut indicators = self
            .indicators
            .write()
            .map_err(|_| StorageError::Backend("indicators lock poisoned".to_string()))?;
        let mut audit = self
            .audit
            .write()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;

        if !indicators.contains_key(&row.id) {
            return Err(StorageError::NotFound(format!(
                "indicator {} not found",
                row.id
            )));
        }
        indicators.insert(row.id.clone(), row);
        audit.extend(entries);
        Ok(())
    }

    async fn list_indicators(
        &self,
        assessment_id: &AssessmentId,
    ) -> StorageResult<Vec<IndicatorResponse>> {
        let indicators = self
            .indicators
            .read()
            .map_err(|_| StorageError::Backend("indicators lock poisoned".to_string()))?;
        let mut rows: Vec<_> = indicators
            .values()
            .filter(|r| &r.assessment_id == assessment_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.requirement_id.cmp(&b.requirement_id));
        Ok(rows)
    }
}

#[async_trait]
impl AuditStore for InMemoryReviewStore {
    async fn list_audit(&self, query: &AuditQuery, page: Page) -> StorageResult<Vec<AuditLogEntry>> {
        let audit = self
            .audit
            .read()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;
        let mut entries: Vec<_> = audit.iter().filter(|e| query.matches(e)).cloned().collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(apply_page(entries, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assessment_types::{
        ActorId, AreaId, AuditAction, AuditEntityType, AuditEntryId, CycleId, RequirementId,
        UnitId,
    };
    use chrono::Utc;

    fn make_assessment() -> Assessment {
        Assessment::new(
            CycleId::new("cycle-1"),
            UnitId::new("unit-1"),
            &[AreaId::new("area-1"), AreaId::new("area-2")],
        )
    }

    fn make_entry(action: AuditAction, actor: &str) -> AuditLogEntry {
        AuditLogEntry {
            id: AuditEntryId::generate(),
            actor_id: ActorId::new(actor),
            timestamp: Utc::now(),
            action,
            entity_type: AuditEntityType::Assessment,
            entity_id: "assessment-1".into(),
            before: serde_json::json!({}),
            after: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let store = InMemoryReviewStore::new();
        let assessment = make_assessment();
        let id = assessment.id.clone();
        store
            .insert_assessment(assessment.clone(), vec![])
            .await
            .unwrap();

        let loaded = store.load_assessment(&id).await.unwrap();
        assert_eq!(loaded, assessment);

        let result = store.insert_assessment(assessment, vec![]).await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_commit_bumps_version() {
        let store = InMemoryReviewStore::new();
        let assessment = make_assessment();
        let id = assessment.id.clone();
        store.insert_assessment(assessment, vec![]).await.unwrap();

        let mut loaded = store.load_assessment(&id).await.unwrap();
        let expected = loaded.version;
        loaded.submit().unwrap();
        store
            .commit_assessment(loaded, expected, vec![])
            .await
            .unwrap();

        let reloaded = store.load_assessment(&id).await.unwrap();
        assert_eq!(reloaded.version, expected + 1);
    }

    #[tokio::test]
    async fn test_stale_commit_rejected() {
        let store = InMemoryReviewStore::new();
        let assessment = make_assessment();
        let id = assessment.id.clone();
        store.insert_assessment(assessment, vec![]).await.unwrap();

        // Two copies loaded at the same version.
        let mut first = store.load_assessment(&id).await.unwrap();
        let mut second = store.load_assessment(&id).await.unwrap();
        let version = first.version;

        first.submit().unwrap();
        store
            .commit_assessment(first, version, vec![])
            .await
            .unwrap();

        second.submit().unwrap();
        let result = store.commit_assessment(second, version, vec![]).await;
        assert!(matches!(result, Err(StorageError::VersionConflict { .. })));
    }

    #[tokio::test]
    async fn test_commit_appends_audit_atomically() {
        let store = InMemoryReviewStore::new();
        let assessment = make_assessment();
        let id = assessment.id.clone();
        store.insert_assessment(assessment, vec![]).await.unwrap();

        let mut loaded = store.load_assessment(&id).await.unwrap();
        let version = loaded.version;
        loaded.submit().unwrap();
        store
            .commit_assessment(
                loaded,
                version,
                vec![make_entry(AuditAction::Submitted, "submitter-1")],
            )
            .await
            .unwrap();

        let entries = store
            .list_audit(&AuditQuery::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::Submitted);
    }

    #[tokio::test]
    async fn test_rejected_commit_writes_nothing() {
        let store = InMemoryReviewStore::new();
        let assessment = make_assessment();
        let id = assessment.id.clone();
        store.insert_assessment(assessment, vec![]).await.unwrap();

        let mut stale = store.load_assessment(&id).await.unwrap();
        stale.submit().unwrap();
        let result = store
            .commit_assessment(
                stale,
                99,
                vec![make_entry(AuditAction::Submitted, "submitter-1")],
            )
            .await;
        assert!(matches!(result, Err(StorageError::VersionConflict { .. })));

        // Neither the aggregate nor the audit entry landed.
        let reloaded = store.load_assessment(&id).await.unwrap();
        assert_eq!(reloaded.version, 0);
        let entries = store
            .list_audit(&AuditQuery::default(), Page::default())
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_indicator_rows_do_not_touch_aggregate_version() {
        let store = InMemoryReviewStore::new();
        let assessment = make_assessment();
        let id = assessment.id.clone();
        store.insert_assessment(assessment, vec![]).await.unwrap();

        let row = IndicatorResponse::new(
            id.clone(),
            RequirementId::new("req-1"),
            AreaId::new("area-1"),
        );
        let row_id = row.id.clone();
        store.insert_indicator(row).await.unwrap();

        let mut row = store.get_indicator(&row_id).await.unwrap();
        row.requires_rework = true;
        store.update_indicator(row, vec![]).await.unwrap();

        assert_eq!(store.load_assessment(&id).await.unwrap().version, 0);
        assert_eq!(store.list_indicators(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_audit_query_filters_and_order() {
        let store = InMemoryReviewStore::new();
        let assessment = make_assessment();
        let id = assessment.id.clone();
        store.insert_assessment(assessment, vec![]).await.unwrap();

        let entries = vec![
            make_entry(AuditAction::Submitted, "submitter-1"),
            make_entry(AuditAction::AreaApproved, "validator-1"),
            make_entry(AuditAction::AreaApproved, "validator-2"),
        ];
        let mut loaded = store.load_assessment(&id).await.unwrap();
        let version = loaded.version;
        loaded.submit().unwrap();
        store
            .commit_assessment(loaded, version, entries)
            .await
            .unwrap();

        let all = store
            .list_audit(&AuditQuery::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let approvals = store
            .list_audit(
                &AuditQuery {
                    action: Some(AuditAction::AreaApproved),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(approvals.len(), 2);

        let by_actor = store
            .list_audit(
                &AuditQuery {
                    actor_id: Some(ActorId::new("validator-1")),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_actor.len(), 1);

        let paged = store
            .list_audit(
                &AuditQuery::default(),
                Page {
                    limit: 2,
                    offset: 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(paged.len(), 2);
    }
}

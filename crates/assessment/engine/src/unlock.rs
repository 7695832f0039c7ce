//! Pure lookup deciding whether a requirement is currently editable.
//!
//! Resolved from the assessment's present rework/calibration scope each
//! time instead of stored back-pointers between indicator responses and
//! calibration requests.

use assessment_types::{AreaId, AreaStatus, Assessment, AssessmentStatus, RequirementId};

/// Whether the submitting unit may edit the given requirement right now.
pub fn is_requirement_unlocked(
    assessment: &Assessment,
    area_id: &AreaId,
    requirement_id: &RequirementId,
) -> bool {
    match assessment.status {
        AssessmentStatus::Draft => true,
        AssessmentStatus::Rework => {
            if assessment.is_final_approver_recalibration {
                assessment.recalibration_targets.contains(requirement_id)
            } else if assessment.is_calibration_rework {
                assessment.open_calibration(area_id).is_some()
            } else {
                // Plain rework unlocks the areas sent back, nothing else.
                assessment
                    .area_states
                    .get(area_id)
                    .is_some_and(|a| a.status == AreaStatus::Rework)
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assessment_types::{ActorId, CycleId, ReworkPolicy, UnitId};

    fn areas() -> Vec<AreaId> {
        (1..=3).map(|i| AreaId::new(format!("area-{}", i))).collect()
    }

    fn req(i: u32) -> RequirementId {
        RequirementId::new(format!("req-{}", i))
    }

    #[test]
    fn test_draft_is_fully_unlocked() {
        let a = Assessment::new(CycleId::new("c"), UnitId::new("u"), &areas());
        assert!(is_requirement_unlocked(&a, &AreaId::new("area-1"), &req(1)));
    }

    #[test]
    fn test_review_stages_are_locked() {
        let mut a = Assessment::new(CycleId::new("c"), UnitId::new("u"), &areas());
        a.submit().unwrap();
        assert!(!is_requirement_unlocked(&a, &AreaId::new("area-1"), &req(1)));
    }

    #[test]
    fn test_plain_rework_unlocks_only_reworked_area() {
        let mut a = Assessment::new(CycleId::new("c"), UnitId::new("u"), &areas());
        a.submit().unwrap();
        a.request_area_rework(&AreaId::new("area-2"), ReworkPolicy::GlobalSingleRound)
            .unwrap();

        assert!(is_requirement_unlocked(&a, &AreaId::new("area-2"), &req(5)));
        assert!(!is_requirement_unlocked(&a, &AreaId::new("area-1"), &req(1)));
    }

    #[test]
    fn test_calibration_unlocks_only_calibrated_area() {
        let mut a = Assessment::new(CycleId::new("c"), UnitId::new("u"), &areas());
        a.submit().unwrap();
        for area in areas() {
            a.approve_area(&area, &ActorId::new("v")).unwrap();
        }
        a.request_calibration(&AreaId::new("area-3"), ActorId::new("validator"), None)
            .unwrap();

        assert!(is_requirement_unlocked(&a, &AreaId::new("area-3"), &req(9)));
        assert!(!is_requirement_unlocked(&a, &AreaId::new("area-1"), &req(1)));

        // Once resolved, the area locks again.
        a.submit_for_calibration(&AreaId::new("area-3")).unwrap();
        assert!(!is_requirement_unlocked(&a, &AreaId::new("area-3"), &req(9)));
    }

    #[test]
    fn test_recalibration_unlocks_only_named_requirements() {
        let mut a = Assessment::new(CycleId::new("c"), UnitId::new("u"), &areas());
        a.submit().unwrap();
        for area in areas() {
            a.approve_area(&area, &ActorId::new("v")).unwrap();
        }
        a.finalize().unwrap();
        a.request_recalibration([req(7)], 1).unwrap();

        assert!(is_requirement_unlocked(&a, &AreaId::new("area-1"), &req(7)));
        assert!(!is_requirement_unlocked(&a, &AreaId::new("area-1"), &req(8)));
    }
}

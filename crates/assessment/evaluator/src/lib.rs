//! Compliance rule evaluator.
//!
//! Converts a requirement's checklist schema plus a response payload into
//! an advisory pass/fail recommendation with per-item detail. The caller
//! (a reviewer action) decides whether to accept the recommendation or
//! override it; overriding never touches the underlying checklist data.
//!
//! Evaluation is a pure function of its two inputs. Grace-period handling
//! compares against the deadline recorded in the schema, never the wall
//! clock, so results stay reproducible after the fact.

#![deny(unsafe_code)]

use assessment_types::{ChecklistItem, ChecklistSchema, OptionGroup, ValidationStatus};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Advisory outcome for a whole requirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Pass,
    Fail,
}

/// Outcome for one checklist item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemVerdict {
    pub satisfied: bool,
    /// Satisfied only through the grace window after the deadline.
    pub within_grace: bool,
}

impl ItemVerdict {
    fn plain(satisfied: bool) -> Self {
        Self {
            satisfied,
            within_grace: false,
        }
    }
}

/// Full evaluation result for one requirement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub recommendation: Recommendation,
    /// Verdict per evaluable item key.
    pub items: BTreeMap<String, ItemVerdict>,
}

impl Evaluation {
    /// Map the recommendation to a validation status. Grace-window
    /// compliance is pass-equivalent downstream but surfaced distinctly
    /// to reviewers as `Considered`.
    pub fn suggested_status(&self) -> ValidationStatus {
        match self.recommendation {
            Recommendation::Fail => ValidationStatus::Fail,
            Recommendation::Pass => {
                if self
                    .items
                    .values()
                    .any(|v| v.satisfied && v.within_grace)
                {
                    ValidationStatus::Considered
                } else {
                    ValidationStatus::Pass
                }
            }
        }
    }
}

/// Evaluate a checklist response against its schema.
///
/// For `AnyRequired`, a schema that marks no item as required falls back
/// to "any evaluable item satisfied" instead of failing outright.
pub fn evaluate(schema: &ChecklistSchema, response: &BTreeMap<String, Value>) -> Evaluation {
    let mut items = BTreeMap::new();
    for item in schema.evaluable_items() {
        items.insert(item.key().to_string(), item_verdict(item, response));
    }

    let passed = match &schema.rule {
        assessment_types::ValidationRule::AllRequired => schema
            .evaluable_items()
            .filter(|i| i.required())
            .all(|i| items[i.key()].satisfied),
        assessment_types::ValidationRule::AnyRequired => {
            let mut required = schema.evaluable_items().filter(|i| i.required()).peekable();
            if required.peek().is_some() {
                required.any(|i| items[i.key()].satisfied)
            } else {
                schema.evaluable_items().any(|i| items[i.key()].satisfied)
            }
        }
        assessment_types::ValidationRule::OrLogicAtLeastOne
        | assessment_types::ValidationRule::AnyOptionGroup => schema
            .option_groups
            .iter()
            .any(|g| group_satisfied(g, &items, &[])),
        assessment_types::ValidationRule::SharedPlusOrLogic { shared } => {
            let shared_ok = shared
                .iter()
                .all(|key| items.get(key).map(|v| v.satisfied).unwrap_or(false));
            shared_ok
                && schema
                    .option_groups
                    .iter()
                    .any(|g| group_satisfied(g, &items, shared))
        }
    };

    Evaluation {
        recommendation: if passed {
            Recommendation::Pass
        } else {
            Recommendation::Fail
        },
        items,
    }
}

/// A group counts only when every one of its (non-shared) keys that names
/// an evaluable item is satisfied, and at least one such key exists.
fn group_satisfied(
    group: &OptionGroup,
    items: &BTreeMap<String, ItemVerdict>,
    excluded: &[String],
) -> bool {
    let mut seen = false;
    for key in group.keys.iter().filter(|k| !excluded.contains(k)) {
        match items.get(key) {
            Some(verdict) => {
                seen = true;
                if !verdict.satisfied {
                    return false;
                }
            }
            // Keys that name no evaluable item carry no meaning.
            None => continue,
        }
    }
    seen
}

// ── Per-item satisfaction predicates ─────────────────────────────────

fn item_verdict(item: &ChecklistItem, response: &BTreeMap<String, Value>) -> ItemVerdict {
    let value = response.get(item.key());
    match item {
        ChecklistItem::Checkbox { .. } => {
            ItemVerdict::plain(value.and_then(Value::as_bool) == Some(true))
        }
        ChecklistItem::CurrencyThreshold { minimum, .. } => {
            ItemVerdict::plain(value.and_then(Value::as_f64).is_some_and(|v| v >= *minimum))
        }
        ChecklistItem::NumericRange { min, max, .. } => ItemVerdict::plain(
            value
                .and_then(Value::as_f64)
                .is_some_and(|v| v >= *min && max.map_or(true, |m| v <= m)),
        ),
        ChecklistItem::FreeText { .. } => ItemVerdict::plain(
            value
                .and_then(Value::as_str)
                .is_some_and(|s| !s.trim().is_empty()),
        ),
        ChecklistItem::SingleSelect { options, .. } | ChecklistItem::Dropdown { options, .. } => {
            ItemVerdict::plain(value.and_then(Value::as_str).is_some_and(|s| {
                !s.trim().is_empty() && (options.is_empty() || options.iter().any(|o| o == s))
            }))
        }
        ChecklistItem::DateWithGracePeriod {
            deadline,
            grace_period_days,
            ..
        } => date_verdict(value, *deadline, *grace_period_days),
        ChecklistItem::SubAssessment { items, .. } => {
            let verdicts: Vec<ItemVerdict> = items
                .iter()
                .filter(|i| i.is_evaluable())
                .filter(|i| i.required())
                .map(|i| item_verdict(i, response))
                .collect();
            let satisfied = !verdicts.is_empty() && verdicts.iter().all(|v| v.satisfied);
            ItemVerdict {
                satisfied,
                within_grace: satisfied && verdicts.iter().any(|v| v.within_grace),
            }
        }
        // Filtered out by the caller; unsatisfied if it ever gets here.
        ChecklistItem::Note { .. } => ItemVerdict::plain(false),
    }
}

fn date_verdict(value: Option<&Value>, deadline: NaiveDate, grace_period_days: u32) -> ItemVerdict {
    let Some(date) = value
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    else {
        return ItemVerdict::plain(false);
    };
    let grace_end = deadline + Duration::days(i64::from(grace_period_days));
    ItemVerdict {
        satisfied: date <= grace_end,
        within_grace: date > deadline && date <= grace_end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assessment_types::ValidationRule;
    use serde_json::json;

    fn checkbox(key: &str) -> ChecklistItem {
        ChecklistItem::Checkbox {
            key: key.into(),
            label: key.into(),
            required: true,
        }
    }

    fn response(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_all_required_pass_and_fail() {
        let schema = ChecklistSchema::new(
            vec![checkbox("a"), checkbox("b")],
            ValidationRule::AllRequired,
        );
        let eval = evaluate(&schema, &response(&[("a", json!(true)), ("b", json!(true))]));
        assert_eq!(eval.recommendation, Recommendation::Pass);
        assert_eq!(eval.suggested_status(), ValidationStatus::Pass);

        let eval = evaluate(&schema, &response(&[("a", json!(true))]));
        assert_eq!(eval.recommendation, Recommendation::Fail);
        assert!(!eval.items["b"].satisfied);
    }

    #[test]
    fn test_any_required() {
        let schema = ChecklistSchema::new(
            vec![checkbox("a"), checkbox("b")],
            ValidationRule::AnyRequired,
        );
        let eval = evaluate(&schema, &response(&[("b", json!(true))]));
        assert_eq!(eval.recommendation, Recommendation::Pass);

        let eval = evaluate(&schema, &response(&[]));
        assert_eq!(eval.recommendation, Recommendation::Fail);
    }

    #[test]
    fn test_any_required_without_required_items_checks_every_item() {
        let optional = |key: &str| ChecklistItem::Checkbox {
            key: key.into(),
            label: key.into(),
            required: false,
        };
        let schema = ChecklistSchema::new(
            vec![optional("a"), optional("b")],
            ValidationRule::AnyRequired,
        );

        let eval = evaluate(&schema, &response(&[("b", json!(true))]));
        assert_eq!(eval.recommendation, Recommendation::Pass);

        let eval = evaluate(&schema, &response(&[]));
        assert_eq!(eval.recommendation, Recommendation::Fail);
    }

    #[test]
    fn test_notes_are_filtered_out() {
        let schema = ChecklistSchema::new(
            vec![
                checkbox("a"),
                ChecklistItem::Note {
                    key: "info".into(),
                    label: "informational".into(),
                },
            ],
            ValidationRule::AllRequired,
        );
        let eval = evaluate(&schema, &response(&[("a", json!(true))]));
        assert_eq!(eval.recommendation, Recommendation::Pass);
        assert!(!eval.items.contains_key("info"));
    }

    #[test]
    fn test_currency_threshold() {
        let schema = ChecklistSchema::new(
            vec![ChecklistItem::CurrencyThreshold {
                key: "budget".into(),
                label: "Allocated budget".into(),
                required: true,
                minimum: 50_000.0,
            }],
            ValidationRule::AllRequired,
        );
        assert_eq!(
            evaluate(&schema, &response(&[("budget", json!(50_000.0))])).recommendation,
            Recommendation::Pass
        );
        assert_eq!(
            evaluate(&schema, &response(&[("budget", json!(49_999.99))])).recommendation,
            Recommendation::Fail
        );
        // Absent or non-numeric values are unsatisfied, never an error.
        assert_eq!(
            evaluate(&schema, &response(&[("budget", json!("a lot"))])).recommendation,
            Recommendation::Fail
        );
        assert_eq!(
            evaluate(&schema, &response(&[])).recommendation,
            Recommendation::Fail
        );
    }

    #[test]
    fn test_numeric_range() {
        let schema = ChecklistSchema::new(
            vec![ChecklistItem::NumericRange {
                key: "sessions".into(),
                label: "Sessions held".into(),
                required: true,
                min: 4.0,
                max: Some(52.0),
            }],
            ValidationRule::AllRequired,
        );
        assert_eq!(
            evaluate(&schema, &response(&[("sessions", json!(12))])).recommendation,
            Recommendation::Pass
        );
        assert_eq!(
            evaluate(&schema, &response(&[("sessions", json!(3))])).recommendation,
            Recommendation::Fail
        );
        assert_eq!(
            evaluate(&schema, &response(&[("sessions", json!(60))])).recommendation,
            Recommendation::Fail
        );
    }

    #[test]
    fn test_select_requires_listed_option() {
        let schema = ChecklistSchema::new(
            vec![ChecklistItem::SingleSelect {
                key: "venue".into(),
                label: "Posting venue".into(),
                required: true,
                options: vec!["hall".into(), "plaza".into()],
            }],
            ValidationRule::AllRequired,
        );
        assert_eq!(
            evaluate(&schema, &response(&[("venue", json!("plaza"))])).recommendation,
            Recommendation::Pass
        );
        assert_eq!(
            evaluate(&schema, &response(&[("venue", json!("elsewhere"))])).recommendation,
            Recommendation::Fail
        );
        assert_eq!(
            evaluate(&schema, &response(&[("venue", json!(""))])).recommendation,
            Recommendation::Fail
        );
    }

    fn grace_schema() -> ChecklistSchema {
        ChecklistSchema::new(
            vec![ChecklistItem::DateWithGracePeriod {
                key: "posted_on".into(),
                label: "Budget posted on".into(),
                required: true,
                deadline: NaiveDate::from_ymd_opt(2024, 10, 31).unwrap(),
                grace_period_days: 15,
            }],
            ValidationRule::AllRequired,
        )
    }

    #[test]
    fn test_on_time_date_is_plain_pass() {
        let eval = evaluate(
            &grace_schema(),
            &response(&[("posted_on", json!("2024-10-31"))]),
        );
        assert_eq!(eval.recommendation, Recommendation::Pass);
        assert_eq!(eval.suggested_status(), ValidationStatus::Pass);
        assert!(!eval.items["posted_on"].within_grace);
    }

    #[test]
    fn test_grace_boundary() {
        // Exactly deadline + grace: pass-equivalent, surfaced as Considered.
        let eval = evaluate(
            &grace_schema(),
            &response(&[("posted_on", json!("2024-11-15"))]),
        );
        assert_eq!(eval.recommendation, Recommendation::Pass);
        assert_eq!(eval.suggested_status(), ValidationStatus::Considered);
        assert!(eval.items["posted_on"].within_grace);

        // One day past the grace window: fail.
        let eval = evaluate(
            &grace_schema(),
            &response(&[("posted_on", json!("2024-11-16"))]),
        );
        assert_eq!(eval.recommendation, Recommendation::Fail);
        assert_eq!(eval.suggested_status(), ValidationStatus::Fail);
    }

    #[test]
    fn test_unparseable_date_fails() {
        let eval = evaluate(
            &grace_schema(),
            &response(&[("posted_on", json!("Oct 31, 2024"))]),
        );
        assert_eq!(eval.recommendation, Recommendation::Fail);
    }

    fn grouped_schema(rule: ValidationRule) -> ChecklistSchema {
        ChecklistSchema::new(
            vec![
                checkbox("a1"),
                checkbox("a2"),
                checkbox("b1"),
                checkbox("b2"),
            ],
            rule,
        )
        .with_option_groups(vec![
            OptionGroup {
                name: "Group A".into(),
                keys: vec!["a1".into(), "a2".into()],
            },
            OptionGroup {
                name: "Group B".into(),
                keys: vec!["b1".into(), "b2".into()],
            },
        ])
    }

    #[test]
    fn test_any_option_group() {
        let schema = grouped_schema(ValidationRule::AnyOptionGroup);

        // Only group B fully satisfied: pass.
        let eval = evaluate(
            &schema,
            &response(&[("b1", json!(true)), ("b2", json!(true)), ("a1", json!(true))]),
        );
        assert_eq!(eval.recommendation, Recommendation::Pass);

        // Neither group fully satisfied: fail.
        let eval = evaluate(
            &schema,
            &response(&[("a1", json!(true)), ("b1", json!(true))]),
        );
        assert_eq!(eval.recommendation, Recommendation::Fail);
    }

    #[test]
    fn test_shared_plus_or_logic() {
        let schema = ChecklistSchema::new(
            vec![
                checkbox("shared"),
                checkbox("a1"),
                checkbox("b1"),
            ],
            ValidationRule::SharedPlusOrLogic {
                shared: vec!["shared".into()],
            },
        )
        .with_option_groups(vec![
            OptionGroup {
                name: "A".into(),
                keys: vec!["a1".into()],
            },
            OptionGroup {
                name: "B".into(),
                keys: vec!["b1".into()],
            },
        ]);

        let eval = evaluate(
            &schema,
            &response(&[("shared", json!(true)), ("b1", json!(true))]),
        );
        assert_eq!(eval.recommendation, Recommendation::Pass);

        // A full group without the shared subset is not enough.
        let eval = evaluate(&schema, &response(&[("b1", json!(true))]));
        assert_eq!(eval.recommendation, Recommendation::Fail);

        // The shared subset alone is not enough either.
        let eval = evaluate(&schema, &response(&[("shared", json!(true))]));
        assert_eq!(eval.recommendation, Recommendation::Fail);
    }

    #[test]
    fn test_sub_assessment() {
        let schema = ChecklistSchema::new(
            vec![ChecklistItem::SubAssessment {
                key: "plan".into(),
                label: "Development plan".into(),
                required: true,
                items: vec![checkbox("plan_adopted"), checkbox("plan_posted")],
            }],
            ValidationRule::AllRequired,
        );
        let eval = evaluate(
            &schema,
            &response(&[("plan_adopted", json!(true)), ("plan_posted", json!(true))]),
        );
        assert_eq!(eval.recommendation, Recommendation::Pass);

        let eval = evaluate(&schema, &response(&[("plan_adopted", json!(true))]));
        assert_eq!(eval.recommendation, Recommendation::Fail);
    }

    #[test]
    fn test_unknown_response_keys_ignored() {
        let schema = ChecklistSchema::new(vec![checkbox("a")], ValidationRule::AllRequired);
        let eval = evaluate(
            &schema,
            &response(&[("a", json!(true)), ("stray", json!(false))]),
        );
        assert_eq!(eval.recommendation, Recommendation::Pass);
        assert!(!eval.items.contains_key("stray"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_response() -> impl Strategy<Value = BTreeMap<String, Value>> {
            prop::collection::btree_map(
                "[a-d][0-9]",
                prop_oneof![
                    any::<bool>().prop_map(Value::from),
                    (0u32..100_000).prop_map(Value::from),
                    "[a-z]{0,8}".prop_map(Value::from),
                ],
                0..8,
            )
        }

        proptest! {
            /// Identical inputs always produce identical output.
            #[test]
            fn evaluation_is_deterministic(response in arb_response()) {
                let schema = grouped_schema(ValidationRule::AnyOptionGroup);
                let first = evaluate(&schema, &response);
                let second = evaluate(&schema, &response);
                prop_assert_eq!(first, second);
            }

            /// The recommendation agrees with the per-item verdicts under
            /// the all-required rule.
            #[test]
            fn all_required_agrees_with_items(response in arb_response()) {
                let schema = ChecklistSchema::new(
                    vec![checkbox("a1"), checkbox("a2"), checkbox("b1")],
                    ValidationRule::AllRequired,
                );
                let eval = evaluate(&schema, &response);
                let all_satisfied = eval.items.values().all(|v| v.satisfied);
                prop_assert_eq!(
                    eval.recommendation == Recommendation::Pass,
                    all_satisfied
                );
            }
        }
    }
}

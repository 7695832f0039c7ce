//! Checklist schemas supplied by the requirement catalog.
//!
//! A requirement's checklist is a closed set of tagged item variants plus a
//! validation rule. Keeping the variants closed means the evaluator's branch
//! set is exhaustively checked by the compiler instead of interpreted from
//! free-form schema data at runtime.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One atomic evidence requirement within a checklist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChecklistItem {
    /// A box the submitter ticks when the evidence is on file.
    Checkbox {
        key: String,
        label: String,
        required: bool,
    },
    /// A monetary figure that must meet a configured minimum.
    CurrencyThreshold {
        key: String,
        label: String,
        required: bool,
        minimum: f64,
    },
    /// A numeric value that must fall inside a configured range.
    NumericRange {
        key: String,
        label: String,
        required: bool,
        min: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Free text; any non-empty answer satisfies the item.
    FreeText {
        key: String,
        label: String,
        required: bool,
    },
    /// One choice out of a fixed option list.
    SingleSelect {
        key: String,
        label: String,
        required: bool,
        options: Vec<String>,
    },
    /// Dropdown selection; same satisfaction rule as single-select.
    Dropdown {
        key: String,
        label: String,
        required: bool,
        options: Vec<String>,
    },
    /// A dated document that must land on or before the deadline, with a
    /// configured tolerance window after it.
    DateWithGracePeriod {
        key: String,
        label: String,
        required: bool,
        deadline: NaiveDate,
        grace_period_days: u32,
    },
    /// A nested block of items that must all hold for the parent to hold.
    SubAssessment {
        key: String,
        label: String,
        required: bool,
        items: Vec<ChecklistItem>,
    },
    /// Informational text; never evaluated.
    Note { key: String, label: String },
}

impl ChecklistItem {
    pub fn key(&self) -> &str {
        match self {
            Self::Checkbox { key, .. }
            | Self::CurrencyThreshold { key, .. }
            | Self::NumericRange { key, .. }
            | Self::FreeText { key, .. }
            | Self::SingleSelect { key, .. }
            | Self::Dropdown { key, .. }
            | Self::DateWithGracePeriod { key, .. }
            | Self::SubAssessment { key, .. }
            | Self::Note { key, .. } => key,
        }
    }

    pub fn required(&self) -> bool {
        match self {
            Self::Checkbox { required, .. }
            | Self::CurrencyThreshold { required, .. }
            | Self::NumericRange { required, .. }
            | Self::FreeText { required, .. }
            | Self::SingleSelect { required, .. }
            | Self::Dropdown { required, .. }
            | Self::DateWithGracePeriod { required, .. }
            | Self::SubAssessment { required, .. } => *required,
            Self::Note { .. } => false,
        }
    }

    /// Informational items carry no pass/fail meaning.
    pub fn is_evaluable(&self) -> bool {
        !matches!(self, Self::Note { .. })
    }
}

/// How per-item results aggregate into a recommendation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidationRule {
    /// Every required item must be satisfied.
    AllRequired,
    /// At least one required item must be satisfied.
    AnyRequired,
    /// At least one full option group must be satisfied.
    OrLogicAtLeastOne,
    /// Same as `OrLogicAtLeastOne`; kept as a distinct catalog spelling.
    AnyOptionGroup,
    /// A fixed shared subset must hold, plus at least one full option group.
    SharedPlusOrLogic { shared: Vec<String> },
}

/// A named set of item keys where satisfying any one complete group suffices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptionGroup {
    pub name: String,
    pub keys: Vec<String>,
}

/// The full checklist definition for one requirement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChecklistSchema {
    pub items: Vec<ChecklistItem>,
    pub rule: ValidationRule,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub option_groups: Vec<OptionGroup>,
}

impl ChecklistSchema {
    pub fn new(items: Vec<ChecklistItem>, rule: ValidationRule) -> Self {
        Self {
            items,
            rule,
            option_groups: Vec::new(),
        }
    }

    pub fn with_option_groups(mut self, groups: Vec<OptionGroup>) -> Self {
        self.option_groups = groups;
        self
    }

    pub fn item(&self, key: &str) -> Option<&ChecklistItem> {
        self.items.iter().find(|i| i.key() == key)
    }

    /// Items that carry pass/fail meaning.
    pub fn evaluable_items(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.items.iter().filter(|i| i.is_evaluable())
    }
}

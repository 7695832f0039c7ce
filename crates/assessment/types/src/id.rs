//! Newtype identifiers shared across the platform.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// One submission-and-review cycle for a submitting unit.
    AssessmentId
);
string_id!(
    /// The assessment period this submission belongs to.
    CycleId
);
string_id!(
    /// The submitting unit under assessment.
    UnitId
);
string_id!(
    /// One of the fixed set of governance areas under review.
    AreaId
);
string_id!(
    /// A human actor: submitter, area reviewer, validator, or approver.
    ActorId
);
string_id!(
    /// One evidence requirement from the cycle's requirement catalog.
    RequirementId
);
string_id!(
    /// One requirement's response row within an assessment.
    IndicatorResponseId
);
string_id!(
    /// An immutable audit log entry.
    AuditEntryId
);
string_id!(
    /// Opaque handle to an externally generated explanation text.
    SummaryRef
);

//! Storage abstractions for the assessment review platform.
//!
//! The assessment aggregate is versioned; a commit carries the mutated
//! aggregate together with the audit entries describing the mutation, and
//! either all of it becomes visible or none of it does. That single
//! contract gives the engine both its optimistic-concurrency discipline
//! and its audit-atomicity guarantee.

#![deny(unsafe_code)]

mod error;
pub mod memory;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryReviewStore;
pub use traits::{AssessmentStore, AuditQuery, AuditStore, Page, ReviewStore};

//! Shared record types for the podium scoring platform.
//!
//! - **id**: typed identifiers
//! - **role**: persisted roles and the request-scoped [`RequestContext`]
//! - **catalog**: events, contests, categories, criteria, judges, contestants
//! - **score**: per-criterion score rows
//! - **certification**: aggregate workflow row, role ledger, judge markers
//! - **request**: multi-signature removal / uncertification requests
//! - **entity**: closed enum of browsable tables

pub mod catalog;
pub mod certification;
pub mod entity;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod request;
pub mod role;
pub mod score;

pub use catalog::{
    Assignment, AssignmentStatus, Category, Contest, Contestant, Criterion, Event, Judge,
    OverallDeduction,
};
pub use certification::{
    Certification, CertificationGate, CertificationStatus, JudgeContestantCertification,
    LedgerEntry, LedgerKey, LedgerScope,
};
pub use entity::EntityKind;
pub use error::{Result, TypesError};
pub use id::{
    AssignmentId, CategoryId, CertificationId, ContestId, ContestantId, CriterionId, DeductionId,
    EventId, JudgeId, LedgerEntryId, RequestId, ScoreId, TenantId, UserId,
};
pub use lifecycle::LifecycleState;
pub use request::{RequestKind, RequestStatus, SignOffRequest, Signature};
pub use role::{RequestContext, Role};
pub use score::{Score, ScoreKey};

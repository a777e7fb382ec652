//! Event / contest / category hierarchy and the people scored within it.
//!
//! These are the records the certification core reads but does not own.
//! They carry just enough shape for scoring, judging assignments and winner
//! aggregation.

use crate::id::{
    AssignmentId, CategoryId, ContestId, ContestantId, CriterionId, DeductionId, EventId,
    JudgeId, TenantId, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub tenant_id: TenantId,
    pub name: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    pub tenant_id: TenantId,
    pub event_id: EventId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Scored unit within a contest (e.g. an age or skill division)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub tenant_id: TenantId,
    pub contest_id: ContestId,
    pub name: String,
    /// Contestants competing in this category, in enrolment order
    pub contestant_ids: Vec<ContestantId>,
    pub created_at: DateTime<Utc>,
}

/// Named scoring dimension with a maximum score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: CriterionId,
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: String,
    pub max_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judge {
    pub id: JudgeId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Login account bound to this judge, if any
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contestant {
    pub id: ContestantId,
    pub tenant_id: TenantId,
    pub name: String,
    pub contestant_number: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Pending,
    Active,
    Completed,
    Removed,
}

impl AssignmentStatus {
    /// Whether a judge holding this assignment may submit scores
    pub fn allows_scoring(&self) -> bool {
        matches!(self, AssignmentStatus::Active | AssignmentStatus::Completed)
    }
}

/// Judge-to-category assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub tenant_id: TenantId,
    pub judge_id: JudgeId,
    pub category_id: CategoryId,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
}

/// Penalty subtracted from a contestant's category total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallDeduction {
    pub id: DeductionId,
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub contestant_id: ContestantId,
    pub amount: f64,
    pub reason: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

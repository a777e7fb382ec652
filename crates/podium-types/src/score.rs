use crate::id::{CategoryId, ContestantId, CriterionId, JudgeId, ScoreId, TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upsert key of a score row: one value per judge, contestant and criterion
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScoreKey {
    pub category_id: CategoryId,
    pub contestant_id: ContestantId,
    pub judge_id: JudgeId,
    pub criterion_id: Option<CriterionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub id: ScoreId,
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub contestant_id: ContestantId,
    pub judge_id: JudgeId,
    pub criterion_id: Option<CriterionId>,
    /// `None` for placeholder rows that never received a value
    pub score: Option<f64>,
    pub comment: Option<String>,
    pub is_certified: bool,
    pub is_locked: bool,
    pub certified_by: Option<UserId>,
    pub certified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Score {
    pub fn key(&self) -> ScoreKey {
        ScoreKey {
            category_id: self.category_id.clone(),
            contestant_id: self.contestant_id.clone(),
            judge_id: self.judge_id.clone(),
            criterion_id: self.criterion_id.clone(),
        }
    }

    pub fn matches(&self, key: &ScoreKey) -> bool {
        self.category_id == key.category_id
            && self.contestant_id == key.contestant_id
            && self.judge_id == key.judge_id
            && self.criterion_id == key.criterion_id
    }

    /// Mark certified by `actor`; `lock` additionally freezes the value
    pub fn certify(&mut self, actor: &UserId, lock: bool, at: DateTime<Utc>) {
        self.is_certified = true;
        if lock {
            self.is_locked = true;
        }
        self.certified_by = Some(actor.clone());
        self.certified_at = Some(at);
        self.updated_at = at;
    }

    pub fn uncertify(&mut self, at: DateTime<Utc>) {
        self.is_certified = false;
        self.is_locked = false;
        self.certified_by = None;
        self.certified_at = None;
        self.updated_at = at;
    }
}

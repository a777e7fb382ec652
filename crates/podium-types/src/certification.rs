use crate::id::{
    CategoryId, CertificationId, ContestId, ContestantId, EventId, JudgeId, LedgerEntryId,
    TenantId, UserId,
};
use crate::lifecycle::LifecycleState;
use crate::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificationStatus {
    /// No gate passed yet
    Pending,
    /// At least the judge gate passed
    InProgress,
    /// Board approved; terminal
    Certified,
    /// Rejected with a reason; terminal
    Rejected,
}

impl LifecycleState for CertificationStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Certified | Self::Rejected)
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        use CertificationStatus::*;
        match (self, next) {
            (Pending, InProgress) => true,
            // Gates after the judge step keep the row in progress
            (InProgress, InProgress) => true,
            (InProgress, Certified) => true,
            (Pending, Rejected) | (InProgress, Rejected) => true,
            (Certified, _) | (Rejected, _) => false,
            _ => false,
        }
    }
}

/// The four ordered gates of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificationGate {
    Judge,
    Tally,
    Auditor,
    Board,
}

impl CertificationGate {
    pub const ORDER: [CertificationGate; 4] = [
        CertificationGate::Judge,
        CertificationGate::Tally,
        CertificationGate::Auditor,
        CertificationGate::Board,
    ];

    /// Step number the row sits at once this gate has passed
    pub fn next_step(&self) -> u8 {
        match self {
            CertificationGate::Judge => 2,
            CertificationGate::Tally => 3,
            CertificationGate::Auditor => 4,
            CertificationGate::Board => 4,
        }
    }

    pub fn previous(&self) -> Option<CertificationGate> {
        match self {
            CertificationGate::Judge => None,
            CertificationGate::Tally => Some(CertificationGate::Judge),
            CertificationGate::Auditor => Some(CertificationGate::Tally),
            CertificationGate::Board => Some(CertificationGate::Auditor),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CertificationGate::Judge => "Judge",
            CertificationGate::Tally => "Tally master",
            CertificationGate::Auditor => "Auditor",
            CertificationGate::Board => "Board",
        }
    }
}

/// One workflow row per (event, contest, category)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub id: CertificationId,
    pub tenant_id: TenantId,
    pub event_id: EventId,
    pub contest_id: ContestId,
    pub category_id: CategoryId,
    pub status: CertificationStatus,
    /// 1..=4
    pub current_step: u8,
    pub judge_certified: bool,
    pub tally_certified: bool,
    pub auditor_certified: bool,
    pub board_approved: bool,
    pub rejection_reason: Option<String>,
    pub certified_at: Option<DateTime<Utc>>,
    pub certified_by: Option<UserId>,
    pub notes: Option<String>,
    /// Bumped on every write; used for conditional updates
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Certification {
    pub fn new(
        tenant_id: TenantId,
        event_id: EventId,
        contest_id: ContestId,
        category_id: CategoryId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: CertificationId::generate(),
            tenant_id,
            event_id,
            contest_id,
            category_id,
            status: CertificationStatus::Pending,
            current_step: 1,
            judge_certified: false,
            tally_certified: false,
            auditor_certified: false,
            board_approved: false,
            rejection_reason: None,
            certified_at: None,
            certified_by: None,
            notes: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn gate(&self, gate: CertificationGate) -> bool {
        match gate {
            CertificationGate::Judge => self.judge_certified,
            CertificationGate::Tally => self.tally_certified,
            CertificationGate::Auditor => self.auditor_certified,
            CertificationGate::Board => self.board_approved,
        }
    }

    /// Set a gate and move the step pointer; guards live in the workflow
    pub fn pass_gate(&mut self, gate: CertificationGate, actor: &UserId, at: DateTime<Utc>) {
        match gate {
            CertificationGate::Judge => self.judge_certified = true,
            CertificationGate::Tally => self.tally_certified = true,
            CertificationGate::Auditor => self.auditor_certified = true,
            CertificationGate::Board => self.board_approved = true,
        }
        self.current_step = gate.next_step();
        if gate == CertificationGate::Board {
            self.status = CertificationStatus::Certified;
            self.certified_at = Some(at);
            self.certified_by = Some(actor.clone());
        } else {
            self.status = CertificationStatus::InProgress;
        }
        self.updated_at = at;
    }

    /// `judge ⇐ tally ⇐ auditor ⇐ board`: no gate is set unless all earlier ones are
    pub fn gates_are_ordered(&self) -> bool {
        CertificationGate::ORDER.iter().all(|gate| match gate.previous() {
            Some(previous) => !self.gate(*gate) || self.gate(previous),
            None => true,
        })
    }
}

/// What a ledger record certifies
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum LedgerScope {
    Category(CategoryId),
    Contest(ContestId),
}

/// Uniqueness key of the role certification ledger
pub type LedgerKey = (LedgerScope, Role, Option<JudgeId>);

/// Append-only "role X certified Y at T by Z" record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub tenant_id: TenantId,
    pub scope: LedgerScope,
    pub role: Role,
    /// Set for tally master reviews of a single judge's totals
    pub judge_id: Option<JudgeId>,
    pub user_id: UserId,
    pub signature_name: Option<String>,
    pub comments: Option<String>,
    pub certified_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn key(&self) -> LedgerKey {
        (self.scope.clone(), self.role, self.judge_id.clone())
    }
}

/// Marker that a judge has finished scoring one contestant in one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeContestantCertification {
    pub tenant_id: TenantId,
    pub judge_id: JudgeId,
    pub category_id: CategoryId,
    pub contestant_id: ContestantId,
    pub certified_by: UserId,
    pub certified_at: DateTime<Utc>,
}

impl JudgeContestantCertification {
    pub fn key(&self) -> (JudgeId, CategoryId, ContestantId) {
        (
            self.judge_id.clone(),
            self.category_id.clone(),
            self.contestant_id.clone(),
        )
    }
}

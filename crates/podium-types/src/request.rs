use crate::id::{CategoryId, ContestantId, JudgeId, RequestId, TenantId, UserId};
use crate::lifecycle::LifecycleState;
use crate::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What executing an approved request does to the judge's scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    /// Delete the scores
    ScoreRemoval,
    /// Clear certification flags so the judge can revise
    JudgeUncertification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Collecting signatures
    Pending,
    /// All three signatures present
    Approved,
    /// Executed
    Completed,
}

impl LifecycleState for RequestStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        use RequestStatus::*;
        matches!((self, next), (Pending, Approved) | (Approved, Completed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub signer_id: UserId,
    pub signature_name: String,
    pub signed_at: DateTime<Utc>,
}

/// Multi-party request to reverse a certification.
///
/// Three independent slots (auditor, tally master, board); each is written at
/// most once and the request is approved exactly when all three are filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignOffRequest {
    pub id: RequestId,
    pub tenant_id: TenantId,
    pub kind: RequestKind,
    pub category_id: CategoryId,
    pub judge_id: JudgeId,
    pub contestant_id: Option<ContestantId>,
    pub reason: String,
    pub requested_by: UserId,
    pub status: RequestStatus,
    pub auditor_signature: Option<Signature>,
    pub tally_signature: Option<Signature>,
    pub board_signature: Option<Signature>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SignOffRequest {
    /// Signature slot owned by `role`, `None` if the role has no slot
    pub fn slot(&self, role: Role) -> Option<&Option<Signature>> {
        match role {
            Role::Auditor => Some(&self.auditor_signature),
            Role::TallyMaster => Some(&self.tally_signature),
            Role::Board => Some(&self.board_signature),
            _ => None,
        }
    }

    pub fn slot_mut(&mut self, role: Role) -> Option<&mut Option<Signature>> {
        match role {
            Role::Auditor => Some(&mut self.auditor_signature),
            Role::TallyMaster => Some(&mut self.tally_signature),
            Role::Board => Some(&mut self.board_signature),
            _ => None,
        }
    }

    pub fn all_signed(&self) -> bool {
        self.auditor_signature.is_some()
            && self.tally_signature.is_some()
            && self.board_signature.is_some()
    }

    pub fn signature_count(&self) -> usize {
        [
            &self.auditor_signature,
            &self.tally_signature,
            &self.board_signature,
        ]
        .iter()
        .filter(|slot| slot.is_some())
        .count()
    }

    /// Roles whose signature is still outstanding
    pub fn missing_roles(&self) -> Vec<Role> {
        [Role::Auditor, Role::TallyMaster, Role::Board]
            .into_iter()
            .filter(|role| matches!(self.slot(*role), Some(None)))
            .collect()
    }
}

use crate::error::{Result, TypesError};
use crate::id::{TenantId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Persisted user role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Organizer,
    Board,
    Judge,
    TallyMaster,
    Auditor,
    Emcee,
    Contestant,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Admin,
        Role::Organizer,
        Role::Board,
        Role::Judge,
        Role::TallyMaster,
        Role::Auditor,
        Role::Emcee,
        Role::Contestant,
    ];

    /// Roles allowed to override disclosure gates (winners, finalized data)
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::Board)
    }

    /// Roles that may appear in the role certification ledger
    pub fn is_ledger_role(&self) -> bool {
        matches!(
            self,
            Role::TallyMaster | Role::Auditor | Role::Board | Role::Organizer | Role::Admin
        )
    }

    /// Roles owning a signature slot on removal / uncertification requests
    pub fn is_signatory(&self) -> bool {
        matches!(self, Role::Auditor | Role::TallyMaster | Role::Board)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Organizer => "ORGANIZER",
            Role::Board => "BOARD",
            Role::Judge => "JUDGE",
            Role::TallyMaster => "TALLY_MASTER",
            Role::Auditor => "AUDITOR",
            Role::Emcee => "EMCEE",
            Role::Contestant => "CONTESTANT",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| TypesError::UnknownRole(s.to_string()))
    }
}

/// Request-scoped caller identity.
///
/// Built once per request by the identity collaborator and passed by value
/// (or reference) into every service operation. Nothing in the workflow reads
/// tenant or role from anywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
}

impl RequestContext {
    pub fn new(tenant_id: TenantId, user_id: UserId, role: Role) -> Self {
        Self {
            tenant_id,
            user_id,
            role,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("tally_master".parse::<Role>().unwrap(), Role::TallyMaster);
        assert_eq!("TALLY-MASTER".parse::<Role>().unwrap(), Role::TallyMaster);
        assert_eq!(" auditor ".parse::<Role>().unwrap(), Role::Auditor);
        assert!(matches!(
            "janitor".parse::<Role>(),
            Err(TypesError::UnknownRole(_))
        ));
    }

    #[test]
    fn test_role_classes() {
        assert!(Role::Admin.is_privileged());
        assert!(Role::Board.is_privileged());
        assert!(!Role::Auditor.is_privileged());

        assert!(Role::TallyMaster.is_ledger_role());
        assert!(!Role::Judge.is_ledger_role());

        assert!(Role::Board.is_signatory());
        assert!(!Role::Admin.is_signatory());
    }

    #[test]
    fn test_role_serde_matches_display() {
        for role in Role::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role));
        }
    }
}

use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of browsable record tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Events,
    Contests,
    Categories,
    Criteria,
    Judges,
    Contestants,
    Assignments,
    Scores,
    Deductions,
    Certifications,
    LedgerEntries,
    JudgeCertifications,
    Requests,
}

impl EntityKind {
    pub const ALL: [EntityKind; 13] = [
        EntityKind::Events,
        EntityKind::Contests,
        EntityKind::Categories,
        EntityKind::Criteria,
        EntityKind::Judges,
        EntityKind::Contestants,
        EntityKind::Assignments,
        EntityKind::Scores,
        EntityKind::Deductions,
        EntityKind::Certifications,
        EntityKind::LedgerEntries,
        EntityKind::JudgeCertifications,
        EntityKind::Requests,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Events => "events",
            EntityKind::Contests => "contests",
            EntityKind::Categories => "categories",
            EntityKind::Criteria => "criteria",
            EntityKind::Judges => "judges",
            EntityKind::Contestants => "contestants",
            EntityKind::Assignments => "assignments",
            EntityKind::Scores => "scores",
            EntityKind::Deductions => "overall_deductions",
            EntityKind::Certifications => "certifications",
            EntityKind::LedgerEntries => "role_certifications",
            EntityKind::JudgeCertifications => "judge_contestant_certifications",
            EntityKind::Requests => "sign_off_requests",
        }
    }

    pub fn from_table_name(name: &str) -> Result<Self> {
        EntityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.table_name() == name)
            .ok_or_else(|| TypesError::UnknownEntityKind(name.to_string()))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for EntityKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_table_name(s)
    }
}

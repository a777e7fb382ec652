use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Generate the hex body of a fresh identifier (16 random bytes).
fn random_hex() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Fresh random identifier
            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, random_hex()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(
    /// Tenant (organisation) owning a set of events
    TenantId,
    "tnt"
);
define_id!(
    /// Authenticated user as supplied by the identity collaborator
    UserId,
    "usr"
);
define_id!(EventId, "evt");
define_id!(ContestId, "cst");
define_id!(CategoryId, "cat");
define_id!(CriterionId, "crt");
define_id!(JudgeId, "jdg");
define_id!(ContestantId, "cnt");
define_id!(AssignmentId, "asg");
define_id!(ScoreId, "scr");
define_id!(DeductionId, "ded");
define_id!(
    /// Aggregate `Certification` workflow row
    CertificationId,
    "crf"
);
define_id!(
    /// Role certification ledger record
    LedgerEntryId,
    "led"
);
define_id!(
    /// Score removal / judge uncertification request
    RequestId,
    "req"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_prefixed_and_unique() {
        let a = CategoryId::generate();
        let b = CategoryId::generate();
        assert!(a.as_str().starts_with("cat_"));
        assert_eq!(a.as_str().len(), 4 + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = JudgeId::new("judge-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"judge-1\"");
        let back: JudgeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(format!("{:?}", id), "JudgeId(judge-1)");
    }
}

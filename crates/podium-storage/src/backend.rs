use async_trait::async_trait;
use chrono::{DateTime, Utc};
use podium_types::{
    Assignment, Category, CategoryId, Certification, CertificationId, Contest, ContestId,
    Contestant, ContestantId, Criterion, EntityKind, Event, EventId, Judge,
    JudgeContestantCertification, JudgeId, LedgerEntry, LedgerScope, OverallDeduction, RequestId,
    RequestStatus, Role, Score, ScoreId, SignOffRequest, Signature, TenantId, UserId,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Version conflict on {id}: expected {expected}, found {found}")]
    VersionConflict { id: String, expected: u64, found: u64 },

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Result of a score upsert keyed by (category, contestant, judge, criterion)
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Created(Score),
    Updated(Score),
    /// An existing row matched but is locked; nothing was written
    Locked(Score),
    /// An existing row matched and is certified; nothing was written
    Certified(Score),
}

/// Result of a conditional signature write
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureOutcome {
    /// Slot written; the returned request may now be APPROVED
    Filled(SignOffRequest),
    /// The role's slot already holds a signature
    SlotTaken(SignOffRequest),
    /// The request is no longer collecting signatures
    NotPending(RequestStatus),
    /// The role owns no slot on requests
    NoSlot(Role),
}

/// Result of executing an approved request
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Applied {
        request: SignOffRequest,
        scores_affected: usize,
    },
    NotApproved(RequestStatus),
}

/// Rows touched by an administrative certification reset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSummary {
    pub ledger_entries_removed: usize,
    pub judge_certifications_removed: usize,
    pub scores_unlocked: usize,
    pub certifications_reset: usize,
}

/// Full store contents, used by snapshots
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreContents {
    pub events: Vec<Event>,
    pub contests: Vec<Contest>,
    pub categories: Vec<Category>,
    pub criteria: Vec<Criterion>,
    pub judges: Vec<Judge>,
    pub contestants: Vec<Contestant>,
    pub assignments: Vec<Assignment>,
    pub scores: Vec<Score>,
    pub deductions: Vec<OverallDeduction>,
    pub certifications: Vec<Certification>,
    pub ledger: Vec<LedgerEntry>,
    pub judge_certifications: Vec<JudgeContestantCertification>,
    pub requests: Vec<SignOffRequest>,
}

impl StoreContents {
    pub fn record_count(&self) -> usize {
        self.events.len()
            + self.contests.len()
            + self.categories.len()
            + self.criteria.len()
            + self.judges.len()
            + self.contestants.len()
            + self.assignments.len()
            + self.scores.len()
            + self.deductions.len()
            + self.certifications.len()
            + self.ledger.len()
            + self.judge_certifications.len()
            + self.requests.len()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageStats {
    pub scores: usize,
    pub certified_scores: usize,
    pub locked_scores: usize,
    pub certifications: usize,
    pub ledger_entries: usize,
    pub pending_requests: usize,
}

/// Persistent store consumed by the certification services.
///
/// Every method that checks a condition and writes does both under the same
/// lock, so two concurrent callers can never both observe the old state.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // ---------- catalog ----------

    async fn put_event(&self, event: &Event) -> Result<()>;
    async fn get_event(&self, id: &EventId) -> Result<Option<Event>>;
    async fn put_contest(&self, contest: &Contest) -> Result<()>;
    async fn get_contest(&self, id: &ContestId) -> Result<Option<Contest>>;
    async fn list_contests(&self, event_id: &EventId) -> Result<Vec<Contest>>;
    async fn put_category(&self, category: &Category) -> Result<()>;
    async fn get_category(&self, id: &CategoryId) -> Result<Option<Category>>;
    async fn list_categories(&self, contest_id: &ContestId) -> Result<Vec<Category>>;
    async fn put_criterion(&self, criterion: &Criterion) -> Result<()>;
    async fn list_criteria(&self, category_id: &CategoryId) -> Result<Vec<Criterion>>;
    async fn put_judge(&self, judge: &Judge) -> Result<()>;
    async fn get_judge(&self, id: &JudgeId) -> Result<Option<Judge>>;
    async fn put_contestant(&self, contestant: &Contestant) -> Result<()>;
    async fn get_contestant(&self, id: &ContestantId) -> Result<Option<Contestant>>;
    async fn put_assignment(&self, assignment: &Assignment) -> Result<()>;
    async fn list_assignments(&self, category_id: &CategoryId) -> Result<Vec<Assignment>>;
    async fn put_deduction(&self, deduction: &OverallDeduction) -> Result<()>;
    async fn list_deductions(&self, category_id: &CategoryId) -> Result<Vec<OverallDeduction>>;

    // ---------- scores ----------

    /// Insert or update in place; refuses to touch a locked or certified row
    async fn upsert_score(&self, score: &Score) -> Result<UpsertOutcome>;
    async fn get_score(&self, id: &ScoreId) -> Result<Option<Score>>;
    /// Scores of a category in insertion order
    async fn list_scores(&self, category_id: &CategoryId) -> Result<Vec<Score>>;
    /// Certify every uncertified score of the category; `lock` also locks all of them
    async fn certify_category_scores(
        &self,
        category_id: &CategoryId,
        actor: &UserId,
        lock: bool,
        at: DateTime<Utc>,
    ) -> Result<usize>;

    /// Certify one judge's scores for one contestant; locked rows are untouched
    async fn certify_judge_scores(
        &self,
        category_id: &CategoryId,
        judge_id: &JudgeId,
        contestant_id: &ContestantId,
        actor: &UserId,
        at: DateTime<Utc>,
    ) -> Result<usize>;

    // ---------- role certification ledger ----------

    /// Append a record; `AlreadyExists` when (scope, role, judge) is taken
    async fn insert_ledger_entry(&self, entry: &LedgerEntry) -> Result<()>;
    async fn list_ledger_entries(&self, scope: &LedgerScope) -> Result<Vec<LedgerEntry>>;
    /// `AlreadyExists` when (judge, category, contestant) is taken
    async fn insert_judge_certification(&self, cert: &JudgeContestantCertification)
        -> Result<()>;
    async fn list_judge_certifications(
        &self,
        category_id: &CategoryId,
    ) -> Result<Vec<JudgeContestantCertification>>;
    /// Drop the ledger, judge markers, score flags and workflow rows of a category at once
    async fn reset_certifications(&self, category_id: &CategoryId) -> Result<ResetSummary>;

    // ---------- aggregate workflow rows ----------

    /// `AlreadyExists` when the category already has a workflow row
    async fn insert_certification(&self, cert: &Certification) -> Result<()>;
    async fn get_certification(&self, id: &CertificationId) -> Result<Option<Certification>>;
    async fn find_certification_for_category(
        &self,
        category_id: &CategoryId,
    ) -> Result<Option<Certification>>;
    async fn list_certifications(&self, tenant_id: &TenantId) -> Result<Vec<Certification>>;
    /// Store `cert` only if the stored version equals `cert.version`; returns the stored row
    async fn update_certification_if(&self, cert: &Certification) -> Result<Certification>;
    async fn delete_certification(&self, id: &CertificationId) -> Result<bool>;

    // ---------- sign-off requests ----------

    async fn insert_request(&self, request: &SignOffRequest) -> Result<()>;
    async fn get_request(&self, id: &RequestId) -> Result<Option<SignOffRequest>>;
    async fn list_requests(&self, tenant_id: &TenantId) -> Result<Vec<SignOffRequest>>;
    /// Fill `role`'s slot iff it is empty and the request is PENDING
    async fn fill_signature(
        &self,
        id: &RequestId,
        role: Role,
        signature: Signature,
    ) -> Result<SignatureOutcome>;
    /// APPROVED → COMPLETED plus the request's score effect, in one step
    async fn execute_request(&self, id: &RequestId, at: DateTime<Utc>)
        -> Result<ExecutionOutcome>;

    // ---------- browsing / maintenance ----------

    async fn count(&self, kind: EntityKind) -> Result<usize>;
    async fn browse(
        &self,
        kind: EntityKind,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>>;
    async fn export(&self) -> Result<StoreContents>;
    /// Replace all contents
    async fn import(&self, contents: StoreContents) -> Result<()>;
    async fn get_stats(&self) -> Result<StorageStats>;
}

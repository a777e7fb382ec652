use crate::backend::{
    ExecutionOutcome, ResetSummary, Result, SignatureOutcome, StorageBackend, StorageError,
    StorageStats, StoreContents, UpsertOutcome,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use podium_types::{
    Assignment, AssignmentId, Category, CategoryId, Certification, CertificationId,
    Contest, ContestId, Contestant, ContestantId, Criterion, CriterionId, DeductionId, EntityKind,
    Event, EventId, Judge, JudgeContestantCertification, JudgeId, LedgerEntry, LedgerScope,
    OverallDeduction, RequestId, RequestKind, RequestStatus, Role, Score, ScoreId,
    SignOffRequest, Signature, TenantId, UserId,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// All tables behind one lock so multi-table updates are atomic
#[derive(Default)]
struct Tables {
    events: HashMap<EventId, Event>,
    contests: HashMap<ContestId, Contest>,
    categories: HashMap<CategoryId, Category>,
    criteria: HashMap<CriterionId, Criterion>,
    judges: HashMap<JudgeId, Judge>,
    contestants: HashMap<ContestantId, Contestant>,
    assignments: HashMap<AssignmentId, Assignment>,
    deductions: HashMap<DeductionId, OverallDeduction>,
    // Insertion order is observable (winner ties fall back to it)
    scores: Vec<Score>,
    ledger: Vec<LedgerEntry>,
    judge_certifications: Vec<JudgeContestantCertification>,
    certifications: HashMap<CertificationId, Certification>,
    requests: HashMap<RequestId, SignOffRequest>,
}

impl Tables {
    fn from_contents(contents: StoreContents) -> Self {
        Self {
            events: contents.events.into_iter().map(|r| (r.id.clone(), r)).collect(),
            contests: contents.contests.into_iter().map(|r| (r.id.clone(), r)).collect(),
            categories: contents.categories.into_iter().map(|r| (r.id.clone(), r)).collect(),
            criteria: contents.criteria.into_iter().map(|r| (r.id.clone(), r)).collect(),
            judges: contents.judges.into_iter().map(|r| (r.id.clone(), r)).collect(),
            contestants: contents.contestants.into_iter().map(|r| (r.id.clone(), r)).collect(),
            assignments: contents.assignments.into_iter().map(|r| (r.id.clone(), r)).collect(),
            deductions: contents.deductions.into_iter().map(|r| (r.id.clone(), r)).collect(),
            scores: contents.scores,
            ledger: contents.ledger,
            judge_certifications: contents.judge_certifications,
            certifications: contents
                .certifications
                .into_iter()
                .map(|r| (r.id.clone(), r))
                .collect(),
            requests: contents.requests.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    fn to_contents(&self) -> StoreContents {
        StoreContents {
            events: sorted_by(self.events.values(), |r| (r.created_at, r.id.clone())),
            contests: sorted_by(self.contests.values(), |r| (r.created_at, r.id.clone())),
            categories: sorted_by(self.categories.values(), |r| (r.created_at, r.id.clone())),
            criteria: sorted_by(self.criteria.values(), |r| r.id.clone()),
            judges: sorted_by(self.judges.values(), |r| r.id.clone()),
            contestants: sorted_by(self.contestants.values(), |r| r.id.clone()),
            assignments: sorted_by(self.assignments.values(), |r| (r.assigned_at, r.id.clone())),
            scores: self.scores.clone(),
            deductions: sorted_by(self.deductions.values(), |r| (r.created_at, r.id.clone())),
            certifications: sorted_by(self.certifications.values(), |r| {
                (r.created_at, r.id.clone())
            }),
            ledger: self.ledger.clone(),
            judge_certifications: self.judge_certifications.clone(),
            requests: sorted_by(self.requests.values(), |r| (r.created_at, r.id.clone())),
        }
    }

    fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Events => self.events.len(),
            EntityKind::Contests => self.contests.len(),
            EntityKind::Categories => self.categories.len(),
            EntityKind::Criteria => self.criteria.len(),
            EntityKind::Judges => self.judges.len(),
            EntityKind::Contestants => self.contestants.len(),
            EntityKind::Assignments => self.assignments.len(),
            EntityKind::Scores => self.scores.len(),
            EntityKind::Deductions => self.deductions.len(),
            EntityKind::Certifications => self.certifications.len(),
            EntityKind::LedgerEntries => self.ledger.len(),
            EntityKind::JudgeCertifications => self.judge_certifications.len(),
            EntityKind::Requests => self.requests.len(),
        }
    }
}

fn sorted_by<'a, T, K, F>(rows: impl Iterator<Item = &'a T>, key: F) -> Vec<T>
where
    T: Clone + 'a,
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut out: Vec<T> = rows.cloned().collect();
    out.sort_by_key(|row| key(row));
    out
}

fn page<T: Serialize>(rows: Vec<T>, offset: usize, limit: usize) -> Result<Vec<serde_json::Value>> {
    rows.into_iter()
        .skip(offset)
        .take(limit)
        .map(|row| serde_json::to_value(row).map_err(StorageError::from))
        .collect()
}

/// In-memory storage backend
pub struct MemoryBackend {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put_event(&self, event: &Event) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn get_event(&self, id: &EventId) -> Result<Option<Event>> {
        Ok(self.tables.read().await.events.get(id).cloned())
    }

    async fn put_contest(&self, contest: &Contest) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.contests.insert(contest.id.clone(), contest.clone());
        Ok(())
    }

    async fn get_contest(&self, id: &ContestId) -> Result<Option<Contest>> {
        Ok(self.tables.read().await.contests.get(id).cloned())
    }

    async fn list_contests(&self, event_id: &EventId) -> Result<Vec<Contest>> {
        let tables = self.tables.read().await;
        Ok(sorted_by(
            tables.contests.values().filter(|c| &c.event_id == event_id),
            |c| (c.created_at, c.id.clone()),
        ))
    }

    async fn put_category(&self, category: &Category) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.categories.insert(category.id.clone(), category.clone());
        Ok(())
    }

    async fn get_category(&self, id: &CategoryId) -> Result<Option<Category>> {
        Ok(self.tables.read().await.categories.get(id).cloned())
    }

    async fn list_categories(&self, contest_id: &ContestId) -> Result<Vec<Category>> {
        let tables = self.tables.read().await;
        Ok(sorted_by(
            tables.categories.values().filter(|c| &c.contest_id == contest_id),
            |c| (c.created_at, c.id.clone()),
        ))
    }

    async fn put_criterion(&self, criterion: &Criterion) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.criteria.insert(criterion.id.clone(), criterion.clone());
        Ok(())
    }

    async fn list_criteria(&self, category_id: &CategoryId) -> Result<Vec<Criterion>> {
        let tables = self.tables.read().await;
        Ok(sorted_by(
            tables.criteria.values().filter(|c| &c.category_id == category_id),
            |c| c.id.clone(),
        ))
    }

    async fn put_judge(&self, judge: &Judge) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.judges.insert(judge.id.clone(), judge.clone());
        Ok(())
    }

    async fn get_judge(&self, id: &JudgeId) -> Result<Option<Judge>> {
        Ok(self.tables.read().await.judges.get(id).cloned())
    }

    async fn put_contestant(&self, contestant: &Contestant) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.contestants.insert(contestant.id.clone(), contestant.clone());
        Ok(())
    }

    async fn get_contestant(&self, id: &ContestantId) -> Result<Option<Contestant>> {
        Ok(self.tables.read().await.contestants.get(id).cloned())
    }

    async fn put_assignment(&self, assignment: &Assignment) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.assignments.insert(assignment.id.clone(), assignment.clone());
        Ok(())
    }

    async fn list_assignments(&self, category_id: &CategoryId) -> Result<Vec<Assignment>> {
        let tables = self.tables.read().await;
        Ok(sorted_by(
            tables.assignments.values().filter(|a| &a.category_id == category_id),
            |a| (a.assigned_at, a.id.clone()),
        ))
    }

    async fn put_deduction(&self, deduction: &OverallDeduction) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.deductions.insert(deduction.id.clone(), deduction.clone());
        Ok(())
    }

    async fn list_deductions(&self, category_id: &CategoryId) -> Result<Vec<OverallDeduction>> {
        let tables = self.tables.read().await;
        Ok(sorted_by(
            tables.deductions.values().filter(|d| &d.category_id == category_id),
            |d| (d.created_at, d.id.clone()),
        ))
    }

    async fn upsert_score(&self, score: &Score) -> Result<UpsertOutcome> {
        let mut tables = self.tables.write().await;
        let key = score.key();

        if let Some(existing) = tables.scores.iter_mut().find(|s| s.matches(&key)) {
            if existing.is_locked {
                return Ok(UpsertOutcome::Locked(existing.clone()));
            }
            if existing.is_certified {
                return Ok(UpsertOutcome::Certified(existing.clone()));
            }
            existing.score = score.score;
            existing.comment = score.comment.clone();
            existing.updated_at = score.updated_at;
            return Ok(UpsertOutcome::Updated(existing.clone()));
        }

        tables.scores.push(score.clone());
        Ok(UpsertOutcome::Created(score.clone()))
    }

    async fn get_score(&self, id: &ScoreId) -> Result<Option<Score>> {
        let tables = self.tables.read().await;
        Ok(tables.scores.iter().find(|s| &s.id == id).cloned())
    }

    async fn list_scores(&self, category_id: &CategoryId) -> Result<Vec<Score>> {
        let tables = self.tables.read().await;
        Ok(tables
            .scores
            .iter()
            .filter(|s| &s.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn certify_category_scores(
        &self,
        category_id: &CategoryId,
        actor: &UserId,
        lock: bool,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let mut updated = 0;

        for score in tables
            .scores
            .iter_mut()
            .filter(|s| &s.category_id == category_id)
        {
            if !score.is_certified {
                score.certify(actor, lock, at);
                updated += 1;
            } else if lock && !score.is_locked {
                score.is_locked = true;
                score.updated_at = at;
                updated += 1;
            }
        }

        debug!(category_id = %category_id, updated, lock, "Bulk score certification");
        Ok(updated)
    }

    async fn certify_judge_scores(
        &self,
        category_id: &CategoryId,
        judge_id: &JudgeId,
        contestant_id: &ContestantId,
        actor: &UserId,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let mut updated = 0;

        for score in tables.scores.iter_mut().filter(|s| {
            &s.category_id == category_id
                && &s.judge_id == judge_id
                && &s.contestant_id == contestant_id
                && !s.is_certified
        }) {
            score.certify(actor, false, at);
            updated += 1;
        }

        Ok(updated)
    }

    async fn insert_ledger_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let mut tables = self.tables.write().await;
        let key = entry.key();

        if tables.ledger.iter().any(|e| e.key() == key) {
            return Err(StorageError::AlreadyExists(format!(
                "{:?} certification by {} already recorded",
                entry.scope, entry.role
            )));
        }

        tables.ledger.push(entry.clone());
        Ok(())
    }

    async fn list_ledger_entries(&self, scope: &LedgerScope) -> Result<Vec<LedgerEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .ledger
            .iter()
            .filter(|e| &e.scope == scope)
            .cloned()
            .collect())
    }

    async fn insert_judge_certification(
        &self,
        cert: &JudgeContestantCertification,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let key = cert.key();

        if tables.judge_certifications.iter().any(|c| c.key() == key) {
            return Err(StorageError::AlreadyExists(format!(
                "judge {} already certified contestant {} in category {}",
                cert.judge_id, cert.contestant_id, cert.category_id
            )));
        }

        tables.judge_certifications.push(cert.clone());
        Ok(())
    }

    async fn list_judge_certifications(
        &self,
        category_id: &CategoryId,
    ) -> Result<Vec<JudgeContestantCertification>> {
        let tables = self.tables.read().await;
        Ok(tables
            .judge_certifications
            .iter()
            .filter(|c| &c.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn reset_certifications(&self, category_id: &CategoryId) -> Result<ResetSummary> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut summary = ResetSummary::default();

        let scope = LedgerScope::Category(category_id.clone());
        let before = tables.ledger.len();
        tables.ledger.retain(|e| e.scope != scope);
        summary.ledger_entries_removed = before - tables.ledger.len();

        let before = tables.judge_certifications.len();
        tables
            .judge_certifications
            .retain(|c| &c.category_id != category_id);
        summary.judge_certifications_removed = before - tables.judge_certifications.len();

        for score in tables
            .scores
            .iter_mut()
            .filter(|s| &s.category_id == category_id && (s.is_certified || s.is_locked))
        {
            score.uncertify(now);
            summary.scores_unlocked += 1;
        }

        for cert in tables
            .certifications
            .values_mut()
            .filter(|c| &c.category_id == category_id)
        {
            let mut fresh = Certification::new(
                cert.tenant_id.clone(),
                cert.event_id.clone(),
                cert.contest_id.clone(),
                cert.category_id.clone(),
            );
            fresh.id = cert.id.clone();
            fresh.notes = cert.notes.clone();
            fresh.created_at = cert.created_at;
            fresh.version = cert.version + 1;
            *cert = fresh;
            summary.certifications_reset += 1;
        }

        Ok(summary)
    }

    async fn insert_certification(&self, cert: &Certification) -> Result<()> {
        let mut tables = self.tables.write().await;

        if tables.certifications.contains_key(&cert.id)
            || tables
                .certifications
                .values()
                .any(|c| c.category_id == cert.category_id)
        {
            return Err(StorageError::AlreadyExists(format!(
                "certification for category {}",
                cert.category_id
            )));
        }

        tables.certifications.insert(cert.id.clone(), cert.clone());
        Ok(())
    }

    async fn get_certification(&self, id: &CertificationId) -> Result<Option<Certification>> {
        Ok(self.tables.read().await.certifications.get(id).cloned())
    }

    async fn find_certification_for_category(
        &self,
        category_id: &CategoryId,
    ) -> Result<Option<Certification>> {
        let tables = self.tables.read().await;
        Ok(tables
            .certifications
            .values()
            .find(|c| &c.category_id == category_id)
            .cloned())
    }

    async fn list_certifications(&self, tenant_id: &TenantId) -> Result<Vec<Certification>> {
        let tables = self.tables.read().await;
        Ok(sorted_by(
            tables.certifications.values().filter(|c| &c.tenant_id == tenant_id),
            |c| (c.created_at, c.id.clone()),
        ))
    }

    async fn update_certification_if(&self, cert: &Certification) -> Result<Certification> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .certifications
            .get_mut(&cert.id)
            .ok_or_else(|| StorageError::NotFound(cert.id.to_string()))?;

        if stored.version != cert.version {
            return Err(StorageError::VersionConflict {
                id: cert.id.to_string(),
                expected: cert.version,
                found: stored.version,
            });
        }

        *stored = cert.clone();
        stored.version += 1;
        Ok(stored.clone())
    }

    async fn delete_certification(&self, id: &CertificationId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.certifications.remove(id).is_some())
    }

    async fn insert_request(&self, request: &SignOffRequest) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.requests.contains_key(&request.id) {
            return Err(StorageError::AlreadyExists(request.id.to_string()));
        }
        tables.requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn get_request(&self, id: &RequestId) -> Result<Option<SignOffRequest>> {
        Ok(self.tables.read().await.requests.get(id).cloned())
    }

    async fn list_requests(&self, tenant_id: &TenantId) -> Result<Vec<SignOffRequest>> {
        let tables = self.tables.read().await;
        Ok(sorted_by(
            tables.requests.values().filter(|r| &r.tenant_id == tenant_id),
            |r| (r.created_at, r.id.clone()),
        ))
    }

    async fn fill_signature(
        &self,
        id: &RequestId,
        role: Role,
        signature: Signature,
    ) -> Result<SignatureOutcome> {
        let mut tables = self.tables.write().await;
        let request = tables
            .requests
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        if request.status != RequestStatus::Pending {
            return Ok(SignatureOutcome::NotPending(request.status));
        }

        let slot_taken = match request.slot(role) {
            None => return Ok(SignatureOutcome::NoSlot(role)),
            Some(slot) => slot.is_some(),
        };
        if slot_taken {
            return Ok(SignatureOutcome::SlotTaken(request.clone()));
        }

        let signed_at = signature.signed_at;
        if let Some(slot) = request.slot_mut(role) {
            *slot = Some(signature);
        }

        if request.all_signed() {
            request.status = RequestStatus::Approved;
            request.approved_at = Some(signed_at);
        }

        Ok(SignatureOutcome::Filled(request.clone()))
    }

    async fn execute_request(
        &self,
        id: &RequestId,
        at: DateTime<Utc>,
    ) -> Result<ExecutionOutcome> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let request = tables
            .requests
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        if request.status != RequestStatus::Approved {
            return Ok(ExecutionOutcome::NotApproved(request.status));
        }

        let category_id = request.category_id.clone();
        let judge_id = request.judge_id.clone();
        let targeted = |s: &Score| s.category_id == category_id && s.judge_id == judge_id;

        let scores_affected = match request.kind {
            RequestKind::ScoreRemoval => {
                let before = tables.scores.len();
                tables.scores.retain(|s| !targeted(s));
                before - tables.scores.len()
            }
            RequestKind::JudgeUncertification => {
                let mut count = 0;
                for score in tables.scores.iter_mut().filter(|s| targeted(s)) {
                    score.uncertify(at);
                    count += 1;
                }
                tables
                    .judge_certifications
                    .retain(|c| !(c.category_id == category_id && c.judge_id == judge_id));
                count
            }
        };

        request.status = RequestStatus::Completed;
        request.completed_at = Some(at);

        Ok(ExecutionOutcome::Applied {
            request: request.clone(),
            scores_affected,
        })
    }

    async fn count(&self, kind: EntityKind) -> Result<usize> {
        Ok(self.tables.read().await.count(kind))
    }

    async fn browse(
        &self,
        kind: EntityKind,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>> {
        let contents = self.tables.read().await.to_contents();
        match kind {
            EntityKind::Events => page(contents.events, offset, limit),
            EntityKind::Contests => page(contents.contests, offset, limit),
            EntityKind::Categories => page(contents.categories, offset, limit),
            EntityKind::Criteria => page(contents.criteria, offset, limit),
            EntityKind::Judges => page(contents.judges, offset, limit),
            EntityKind::Contestants => page(contents.contestants, offset, limit),
            EntityKind::Assignments => page(contents.assignments, offset, limit),
            EntityKind::Scores => page(contents.scores, offset, limit),
            EntityKind::Deductions => page(contents.deductions, offset, limit),
            EntityKind::Certifications => page(contents.certifications, offset, limit),
            EntityKind::LedgerEntries => page(contents.ledger, offset, limit),
            EntityKind::JudgeCertifications => page(contents.judge_certifications, offset, limit),
            EntityKind::Requests => page(contents.requests, offset, limit),
        }
    }

    async fn export(&self) -> Result<StoreContents> {
        Ok(self.tables.read().await.to_contents())
    }

    async fn import(&self, contents: StoreContents) -> Result<()> {
        let mut tables = self.tables.write().await;
        *tables = Tables::from_contents(contents);
        Ok(())
    }

    async fn get_stats(&self) -> Result<StorageStats> {
        let tables = self.tables.read().await;
        Ok(StorageStats {
            scores: tables.scores.len(),
            certified_scores: tables.scores.iter().filter(|s| s.is_certified).count(),
            locked_scores: tables.scores.iter().filter(|s| s.is_locked).count(),
            certifications: tables.certifications.len(),
            ledger_entries: tables.ledger.len(),
            pending_requests: tables
                .requests
                .values()
                .filter(|r| r.status == RequestStatus::Pending)
                .count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(judge: &str, contestant: &str, value: f64) -> Score {
        let now = Utc::now();
        Score {
            id: ScoreId::generate(),
            tenant_id: TenantId::new("t"),
            category_id: CategoryId::new("cat"),
            contestant_id: ContestantId::new(contestant),
            judge_id: JudgeId::new(judge),
            criterion_id: Some(CriterionId::new("crit")),
            score: Some(value),
            comment: None,
            is_certified: false,
            is_locked: false,
            certified_by: None,
            certified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn request() -> SignOffRequest {
        SignOffRequest {
            id: RequestId::generate(),
            tenant_id: TenantId::new("t"),
            kind: RequestKind::ScoreRemoval,
            category_id: CategoryId::new("cat"),
            judge_id: JudgeId::new("j1"),
            contestant_id: None,
            reason: "duplicate sheet".to_string(),
            requested_by: UserId::new("board"),
            status: RequestStatus::Pending,
            auditor_signature: None,
            tally_signature: None,
            board_signature: None,
            approved_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    fn signature(user: &str) -> Signature {
        Signature {
            signer_id: UserId::new(user),
            signature_name: user.to_uppercase(),
            signed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let backend = MemoryBackend::new();
        let first = score("j1", "c1", 5.0);
        assert!(matches!(
            backend.upsert_score(&first).await.unwrap(),
            UpsertOutcome::Created(_)
        ));

        let mut revised = score("j1", "c1", 8.0);
        revised.comment = Some("re-scored".to_string());
        match backend.upsert_score(&revised).await.unwrap() {
            UpsertOutcome::Updated(stored) => {
                assert_eq!(stored.id, first.id);
                assert_eq!(stored.score, Some(8.0));
            }
            other => panic!("expected update, got {:?}", other),
        }

        assert_eq!(backend.list_scores(&CategoryId::new("cat")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_locked_score_is_not_overwritten() {
        let backend = MemoryBackend::new();
        backend.upsert_score(&score("j1", "c1", 5.0)).await.unwrap();
        backend
            .certify_category_scores(&CategoryId::new("cat"), &UserId::new("aud"), true, Utc::now())
            .await
            .unwrap();

        let outcome = backend.upsert_score(&score("j1", "c1", 9.0)).await.unwrap();
        assert!(matches!(outcome, UpsertOutcome::Locked(ref s) if s.score == Some(5.0)));
    }

    #[tokio::test]
    async fn test_certified_score_is_not_overwritten() {
        let backend = MemoryBackend::new();
        backend.upsert_score(&score("j1", "c1", 5.0)).await.unwrap();
        backend
            .certify_category_scores(&CategoryId::new("cat"), &UserId::new("j1"), false, Utc::now())
            .await
            .unwrap();

        let outcome = backend.upsert_score(&score("j1", "c1", 9.0)).await.unwrap();
        assert!(matches!(outcome, UpsertOutcome::Certified(ref s) if s.score == Some(5.0)));
        let stored = backend.list_scores(&CategoryId::new("cat")).await.unwrap();
        assert_eq!(stored[0].score, Some(5.0));
    }

    #[tokio::test]
    async fn test_lock_pass_reaches_already_certified_scores() {
        let backend = MemoryBackend::new();
        let category = CategoryId::new("cat");
        backend.upsert_score(&score("j1", "c1", 5.0)).await.unwrap();

        let n = backend
            .certify_category_scores(&category, &UserId::new("j"), false, Utc::now())
            .await
            .unwrap();
        assert_eq!(n, 1);

        let n = backend
            .certify_category_scores(&category, &UserId::new("a"), true, Utc::now())
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert!(backend.list_scores(&category).await.unwrap()[0].is_locked);
    }

    #[tokio::test]
    async fn test_signature_slot_is_compare_and_swap() {
        let backend = MemoryBackend::new();
        let req = request();
        backend.insert_request(&req).await.unwrap();

        let first = backend
            .fill_signature(&req.id, Role::Auditor, signature("a1"))
            .await
            .unwrap();
        assert!(matches!(first, SignatureOutcome::Filled(_)));

        let second = backend
            .fill_signature(&req.id, Role::Auditor, signature("a2"))
            .await
            .unwrap();
        match second {
            SignatureOutcome::SlotTaken(stored) => {
                assert_eq!(stored.auditor_signature.unwrap().signer_id, UserId::new("a1"));
            }
            other => panic!("expected SlotTaken, got {:?}", other),
        }

        let judge = backend
            .fill_signature(&req.id, Role::Judge, signature("j"))
            .await
            .unwrap();
        assert_eq!(judge, SignatureOutcome::NoSlot(Role::Judge));
    }

    #[tokio::test]
    async fn test_concurrent_signatures_fill_slot_once() {
        let backend = Arc::new(MemoryBackend::new());
        let req = request();
        backend.insert_request(&req).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let backend = backend.clone();
            let id = req.id.clone();
            handles.push(tokio::spawn(async move {
                backend
                    .fill_signature(&id, Role::Board, signature(&format!("b{}", i)))
                    .await
                    .unwrap()
            }));
        }

        let mut filled = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), SignatureOutcome::Filled(_)) {
                filled += 1;
            }
        }
        assert_eq!(filled, 1);
    }

    #[tokio::test]
    async fn test_third_signature_approves_and_execution_completes() {
        let backend = MemoryBackend::new();
        let req = request();
        backend.insert_request(&req).await.unwrap();
        backend.upsert_score(&score("j1", "c1", 5.0)).await.unwrap();
        backend.upsert_score(&score("j2", "c1", 6.0)).await.unwrap();

        assert_eq!(
            backend.execute_request(&req.id, Utc::now()).await.unwrap(),
            ExecutionOutcome::NotApproved(RequestStatus::Pending)
        );

        for (role, user) in [
            (Role::Auditor, "a"),
            (Role::TallyMaster, "t"),
            (Role::Board, "b"),
        ] {
            backend.fill_signature(&req.id, role, signature(user)).await.unwrap();
        }
        let stored = backend.get_request(&req.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Approved);
        assert!(stored.approved_at.is_some());

        match backend.execute_request(&req.id, Utc::now()).await.unwrap() {
            ExecutionOutcome::Applied {
                request,
                scores_affected,
            } => {
                assert_eq!(request.status, RequestStatus::Completed);
                assert_eq!(scores_affected, 1);
            }
            other => panic!("expected Applied, got {:?}", other),
        }

        let remaining = backend.list_scores(&CategoryId::new("cat")).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].judge_id, JudgeId::new("j2"));
    }

    #[tokio::test]
    async fn test_certification_version_check() {
        let backend = MemoryBackend::new();
        let cert = Certification::new(
            TenantId::new("t"),
            EventId::new("e"),
            ContestId::new("c"),
            CategoryId::new("cat"),
        );
        backend.insert_certification(&cert).await.unwrap();

        let updated = backend.update_certification_if(&cert).await.unwrap();
        assert_eq!(updated.version, 1);

        // Stale copy still carries version 0
        let err = backend.update_certification_if(&cert).await.unwrap_err();
        assert!(matches!(err, StorageError::VersionConflict { expected: 0, found: 1, .. }));

        let duplicate = Certification::new(
            TenantId::new("t"),
            EventId::new("e"),
            ContestId::new("c"),
            CategoryId::new("cat"),
        );
        assert!(matches!(
            backend.insert_certification(&duplicate).await,
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_browse_pages_rows() {
        let backend = MemoryBackend::new();
        for i in 0..5 {
            backend
                .upsert_score(&score("j1", &format!("c{}", i), i as f64))
                .await
                .unwrap();
        }
        assert_eq!(backend.count(EntityKind::Scores).await.unwrap(), 5);
        let rows = backend.browse(EntityKind::Scores, 1, 2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["contestant_id"], "c1");
        assert!(backend.browse(EntityKind::Judges, 0, 10).await.unwrap().is_empty());
    }
}

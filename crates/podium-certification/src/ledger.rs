//! Role certification ledger.
//!
//! Append-only records of "role R certified scope S". Unique per
//! (scope, role, judge); the per-judge records are the tally master's
//! reviews of individual judges' totals. Judge completion is tracked
//! separately, one marker per (judge, category, contestant).

use crate::access::{
    assigned_judges, load_category, load_contest, load_judge, optional_text, require_role,
};
use crate::error::{CertificationError, Result};
use crate::metrics;
use chrono::Utc;
use podium_storage::{ResetSummary, StorageBackend, StorageError};
use podium_types::{
    Category, CategoryId, ContestId, ContestantId, JudgeContestantCertification, JudgeId,
    LedgerEntry, LedgerEntryId, LedgerScope, RequestContext, Role,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Optional attribution attached to a ledger record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignOff {
    pub signature_name: Option<String>,
    pub comments: Option<String>,
}

/// Where a category stands in the role chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProgress {
    pub category_id: CategoryId,
    pub judges: usize,
    pub contestants: usize,
    pub judge_certifications: usize,
    pub expected_judge_certifications: usize,
    pub judges_certified: bool,
    /// Distinct judges whose totals the tally master reviewed
    pub tally_reviews: usize,
    pub tally_certified: bool,
    pub auditor_certified: bool,
    pub board_certified: bool,
    pub uncertified_scores: usize,
    /// Roles holding a category-level record, in certification order
    pub certified_roles: Vec<Role>,
}

pub(crate) fn ledger_entry(
    ctx: &RequestContext,
    scope: LedgerScope,
    role: Role,
    judge_id: Option<JudgeId>,
    sign_off: SignOff,
) -> LedgerEntry {
    LedgerEntry {
        id: LedgerEntryId::generate(),
        tenant_id: ctx.tenant_id.clone(),
        scope,
        role,
        judge_id,
        user_id: ctx.user_id.clone(),
        signature_name: optional_text(sign_off.signature_name),
        comments: optional_text(sign_off.comments),
        certified_at: Utc::now(),
    }
}

/// Insert a ledger record, reporting a duplicate key as a conflict
pub(crate) async fn append_entry(
    storage: &dyn StorageBackend,
    entry: &LedgerEntry,
    duplicate: impl FnOnce() -> String,
) -> Result<()> {
    match storage.insert_ledger_entry(entry).await {
        Ok(()) => {
            metrics::LEDGER_ENTRIES
                .with_label_values(&[entry.role.as_str()])
                .inc();
            Ok(())
        }
        Err(StorageError::AlreadyExists(_)) => Err(CertificationError::conflict(duplicate())),
        Err(e) => Err(e.into()),
    }
}

/// Insert a ledger record unless one already holds its key; returns whether it was written
pub(crate) async fn append_entry_if_absent(
    storage: &dyn StorageBackend,
    entry: &LedgerEntry,
) -> Result<bool> {
    match append_entry(storage, entry, String::new).await {
        Ok(()) => Ok(true),
        Err(CertificationError::Conflict(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Category-level record of `role` (not a per-judge review)
pub(crate) fn has_category_record(entries: &[LedgerEntry], role: Role) -> bool {
    entries
        .iter()
        .any(|e| e.role == role && e.judge_id.is_none())
}

/// Judges whose totals have a tally master review
pub(crate) fn reviewed_judges(entries: &[LedgerEntry]) -> HashSet<JudgeId> {
    entries
        .iter()
        .filter(|e| e.role == Role::TallyMaster)
        .filter_map(|e| e.judge_id.clone())
        .collect()
}

pub struct CertificationLedger {
    storage: Arc<dyn StorageBackend>,
}

impl CertificationLedger {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Record that the caller's role certified the category
    pub async fn certify_category(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
        sign_off: SignOff,
    ) -> Result<LedgerEntry> {
        if !ctx.role.is_ledger_role() {
            return Err(CertificationError::forbidden(format!(
                "Role {} does not certify categories",
                ctx.role
            )));
        }
        if ctx.role == Role::Auditor {
            return Err(CertificationError::forbidden(
                "Auditors certify categories through final certification",
            ));
        }

        let storage = self.storage.as_ref();
        let category = load_category(storage, ctx, category_id).await?;
        let scope = LedgerScope::Category(category.id.clone());
        let entries = storage.list_ledger_entries(&scope).await?;

        match ctx.role {
            Role::TallyMaster => {
                let judges = assigned_judges(storage, &category.id).await?;
                let reviewed = reviewed_judges(&entries);
                if judges.is_empty() || judges.iter().any(|a| !reviewed.contains(&a.judge_id)) {
                    metrics::GUARD_FAILURES
                        .with_label_values(&["certify_category"])
                        .inc();
                    return Err(CertificationError::validation(
                        "Every judge's totals must be reviewed first",
                    ));
                }
            }
            Role::Board => {
                if !has_category_record(&entries, Role::Auditor) {
                    metrics::GUARD_FAILURES
                        .with_label_values(&["certify_category"])
                        .inc();
                    return Err(CertificationError::validation("Auditor must certify first"));
                }
            }
            _ => {}
        }

        let entry = ledger_entry(ctx, scope, ctx.role, None, sign_off);
        let role = ctx.role;
        append_entry(storage, &entry, || {
            format!("Category already certified by {}", role)
        })
        .await?;

        info!(
            category_id = %category.id,
            role = %entry.role,
            user_id = %entry.user_id,
            "Category certified"
        );
        Ok(entry)
    }

    /// Record that the caller's role certified a whole contest.
    ///
    /// Every category of the contest must already carry the same role's record.
    pub async fn certify_contest(
        &self,
        ctx: &RequestContext,
        contest_id: &ContestId,
        sign_off: SignOff,
    ) -> Result<LedgerEntry> {
        if !ctx.role.is_ledger_role() {
            return Err(CertificationError::forbidden(format!(
                "Role {} does not certify contests",
                ctx.role
            )));
        }

        let storage = self.storage.as_ref();
        let contest = load_contest(storage, ctx, contest_id).await?;
        let categories = storage.list_categories(&contest.id).await?;
        if categories.is_empty() {
            return Err(CertificationError::validation("Contest has no categories"));
        }

        for category in &categories {
            let entries = storage
                .list_ledger_entries(&LedgerScope::Category(category.id.clone()))
                .await?;
            if !has_category_record(&entries, ctx.role) {
                metrics::GUARD_FAILURES
                    .with_label_values(&["certify_contest"])
                    .inc();
                return Err(CertificationError::validation(format!(
                    "Category {} is not yet certified by {}",
                    category.name, ctx.role
                )));
            }
        }

        let entry = ledger_entry(
            ctx,
            LedgerScope::Contest(contest.id.clone()),
            ctx.role,
            None,
            sign_off,
        );
        let role = ctx.role;
        append_entry(storage, &entry, || {
            format!("Contest already certified by {}", role)
        })
        .await?;

        info!(contest_id = %contest.id, role = %entry.role, "Contest certified");
        Ok(entry)
    }

    /// Tally master sign-off on one judge's totals for the category
    pub async fn review_judge_totals(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
        judge_id: &JudgeId,
        sign_off: SignOff,
    ) -> Result<LedgerEntry> {
        require_role(ctx, &[Role::TallyMaster], "review judge totals")?;
        let storage = self.storage.as_ref();
        let category = load_category(storage, ctx, category_id).await?;
        let judge = load_judge(storage, ctx, judge_id).await?;

        let judges = assigned_judges(storage, &category.id).await?;
        if !judges.iter().any(|a| a.judge_id == judge.id) {
            return Err(CertificationError::validation(
                "Judge is not assigned to this category",
            ));
        }

        let markers = storage.list_judge_certifications(&category.id).await?;
        let certified: HashSet<&ContestantId> = markers
            .iter()
            .filter(|m| m.judge_id == judge.id)
            .map(|m| &m.contestant_id)
            .collect();
        if category.contestant_ids.iter().any(|c| !certified.contains(c)) {
            metrics::GUARD_FAILURES
                .with_label_values(&["review_judge_totals"])
                .inc();
            return Err(CertificationError::validation(format!(
                "{} has not certified every contestant",
                judge.name
            )));
        }

        let entry = ledger_entry(
            ctx,
            LedgerScope::Category(category.id.clone()),
            Role::TallyMaster,
            Some(judge.id.clone()),
            sign_off,
        );
        append_entry(storage, &entry, || {
            "Judge totals already reviewed for this category".to_string()
        })
        .await?;

        info!(category_id = %category.id, judge_id = %judge.id, "Judge totals reviewed");
        Ok(entry)
    }

    /// A judge declares their scores for one contestant final.
    ///
    /// Every criterion of the category needs a value from the judge (or at least
    /// one value when the category has no criteria). The judge's scores for the
    /// contestant become certified.
    pub async fn certify_judge_contestant(
        &self,
        ctx: &RequestContext,
        judge_id: &JudgeId,
        category_id: &CategoryId,
        contestant_id: &ContestantId,
    ) -> Result<JudgeContestantCertification> {
        require_role(ctx, &[Role::Judge, Role::Admin], "certify judge scores")?;
        let storage = self.storage.as_ref();
        let judge = load_judge(storage, ctx, judge_id).await?;
        if ctx.role == Role::Judge && judge.user_id.as_ref() != Some(&ctx.user_id) {
            return Err(CertificationError::forbidden(
                "Judges may only certify their own scores",
            ));
        }

        let category = load_category(storage, ctx, category_id).await?;
        if !category.contestant_ids.contains(contestant_id) {
            return Err(CertificationError::validation(
                "Contestant is not entered in this category",
            ));
        }
        let assigned = storage
            .list_assignments(&category.id)
            .await?
            .iter()
            .any(|a| a.judge_id == judge.id && a.status.allows_scoring());
        if !assigned {
            return Err(CertificationError::forbidden(
                "Judge is not assigned to this category",
            ));
        }

        let scores: Vec<_> = storage
            .list_scores(&category.id)
            .await?
            .into_iter()
            .filter(|s| {
                s.judge_id == judge.id && &s.contestant_id == contestant_id && s.score.is_some()
            })
            .collect();
        let criteria = storage.list_criteria(&category.id).await?;
        let missing: Vec<&str> = criteria
            .iter()
            .filter(|c| !scores.iter().any(|s| s.criterion_id.as_ref() == Some(&c.id)))
            .map(|c| c.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(CertificationError::validation(format!(
                "Scores are missing for: {}",
                missing.join(", ")
            )));
        }
        if scores.is_empty() {
            return Err(CertificationError::validation(
                "No scores have been submitted for this contestant",
            ));
        }

        let now = Utc::now();
        let marker = JudgeContestantCertification {
            tenant_id: ctx.tenant_id.clone(),
            judge_id: judge.id.clone(),
            category_id: category.id.clone(),
            contestant_id: contestant_id.clone(),
            certified_by: ctx.user_id.clone(),
            certified_at: now,
        };
        match storage.insert_judge_certification(&marker).await {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => {
                return Err(CertificationError::conflict(
                    "Judge has already certified this contestant",
                ))
            }
            Err(e) => return Err(e.into()),
        }

        let certified = storage
            .certify_judge_scores(&category.id, &judge.id, contestant_id, &ctx.user_id, now)
            .await?;
        metrics::SCORES_CERTIFIED.inc_by(certified as u64);

        info!(
            judge_id = %judge.id,
            category_id = %category.id,
            contestant_id = %contestant_id,
            scores = certified,
            "Judge certified contestant"
        );
        Ok(marker)
    }

    /// True once every assigned judge has certified every entered contestant
    pub async fn is_category_judge_certified(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
    ) -> Result<bool> {
        let category = load_category(self.storage.as_ref(), ctx, category_id).await?;
        let (done, expected) = self.judge_marker_counts(&category).await?;
        Ok(expected > 0 && done == expected)
    }

    pub async fn category_progress(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
    ) -> Result<CategoryProgress> {
        let storage = self.storage.as_ref();
        let category = load_category(storage, ctx, category_id).await?;
        let judges = assigned_judges(storage, &category.id).await?;
        let (done, expected) = self.judge_marker_counts(&category).await?;

        let entries = storage
            .list_ledger_entries(&LedgerScope::Category(category.id.clone()))
            .await?;
        let uncertified_scores = storage
            .list_scores(&category.id)
            .await?
            .iter()
            .filter(|s| s.criterion_id.is_some() && !s.is_certified)
            .count();

        let mut certified_roles = Vec::new();
        for entry in entries.iter().filter(|e| e.judge_id.is_none()) {
            if !certified_roles.contains(&entry.role) {
                certified_roles.push(entry.role);
            }
        }

        Ok(CategoryProgress {
            category_id: category.id.clone(),
            judges: judges.len(),
            contestants: category.contestant_ids.len(),
            judge_certifications: done,
            expected_judge_certifications: expected,
            judges_certified: expected > 0 && done == expected,
            tally_reviews: reviewed_judges(&entries).len(),
            tally_certified: has_category_record(&entries, Role::TallyMaster),
            auditor_certified: has_category_record(&entries, Role::Auditor),
            board_certified: has_category_record(&entries, Role::Board),
            uncertified_scores,
            certified_roles,
        })
    }

    /// Wipe every certification artefact of a category in one atomic step
    pub async fn reset_category(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
    ) -> Result<ResetSummary> {
        require_role(ctx, &[Role::Admin], "reset certifications")?;
        let category = load_category(self.storage.as_ref(), ctx, category_id).await?;
        let summary = self.storage.reset_certifications(&category.id).await?;
        warn!(
            category_id = %category.id,
            user_id = %ctx.user_id,
            ledger_entries = summary.ledger_entries_removed,
            judge_certifications = summary.judge_certifications_removed,
            scores_unlocked = summary.scores_unlocked,
            "Category certifications reset"
        );
        Ok(summary)
    }

    /// (markers present, markers expected) over assigned judges × entered contestants
    async fn judge_marker_counts(&self, category: &Category) -> Result<(usize, usize)> {
        let judges: HashSet<JudgeId> = assigned_judges(self.storage.as_ref(), &category.id)
            .await?
            .into_iter()
            .map(|a| a.judge_id)
            .collect();
        let contestants: HashSet<&ContestantId> = category.contestant_ids.iter().collect();

        let done = self
            .storage
            .list_judge_certifications(&category.id)
            .await?
            .iter()
            .filter(|m| judges.contains(&m.judge_id) && contestants.contains(&m.contestant_id))
            .count();
        Ok((done, judges.len() * contestants.len()))
    }
}

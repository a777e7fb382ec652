use crate::access::{load_category, load_contestant, load_judge, optional_text, require_role};
use crate::config::WorkflowConfig;
use crate::error::{CertificationError, Result};
use crate::metrics;
use chrono::Utc;
use podium_storage::{StorageBackend, UpsertOutcome};
use podium_types::{
    CategoryId, ContestantId, CriterionId, JudgeId, RequestContext, Role, Score, ScoreId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SCORE_READERS: &[Role] = &[
    Role::Admin,
    Role::Organizer,
    Role::Board,
    Role::Judge,
    Role::TallyMaster,
    Role::Auditor,
];
const CERTIFY_ROLES: &[Role] = &[Role::Judge, Role::TallyMaster, Role::Auditor, Role::Admin];

/// Input of a judge score submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub judge_id: JudgeId,
    pub category_id: CategoryId,
    pub contestant_id: ContestantId,
    pub criterion_id: Option<CriterionId>,
    pub value: f64,
    pub comment: Option<String>,
}

/// Per-criterion scores, keyed by (judge, category, contestant, criterion)
pub struct ScoreStore {
    storage: Arc<dyn StorageBackend>,
    config: WorkflowConfig,
}

impl ScoreStore {
    pub fn new(storage: Arc<dyn StorageBackend>, config: WorkflowConfig) -> Self {
        Self { storage, config }
    }

    /// Create or revise a score.
    ///
    /// The judge must hold an ACTIVE or COMPLETED assignment to the category and
    /// the value must lie within `0..=max_score` of the criterion. A certified
    /// or locked row is never modified.
    pub async fn submit_score(
        &self,
        ctx: &RequestContext,
        submission: ScoreSubmission,
    ) -> Result<Score> {
        require_role(ctx, &[Role::Judge, Role::Admin], "submit scores")?;
        let storage = self.storage.as_ref();

        let judge = load_judge(storage, ctx, &submission.judge_id).await?;
        if ctx.role == Role::Judge && judge.user_id.as_ref() != Some(&ctx.user_id) {
            return Err(CertificationError::forbidden(
                "Judges may only submit their own scores",
            ));
        }

        let category = load_category(storage, ctx, &submission.category_id).await?;
        load_contestant(storage, ctx, &submission.contestant_id).await?;
        if !category.contestant_ids.contains(&submission.contestant_id) {
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
            warn!(judge_id = %judge.id, category_id = %category.id, "Score from unassigned judge");
            return Err(CertificationError::forbidden(
                "Judge is not assigned to this category",
            ));
        }

        if !submission.value.is_finite() || submission.value < 0.0 {
            return Err(CertificationError::validation(
                "Score must be a non-negative number",
            ));
        }
        if let Some(criterion_id) = &submission.criterion_id {
            let criterion = storage
                .list_criteria(&category.id)
                .await?
                .into_iter()
                .find(|c| &c.id == criterion_id)
                .ok_or_else(|| CertificationError::not_found("Criterion", criterion_id))?;
            if submission.value > criterion.max_score {
                return Err(CertificationError::validation(format!(
                    "Score {} exceeds the maximum of {} for {}",
                    submission.value, criterion.max_score, criterion.name
                )));
            }
        }

        let comment = optional_text(submission.comment);
        if let Some(comment) = &comment {
            if comment.chars().count() > self.config.max_comment_len {
                return Err(CertificationError::validation(format!(
                    "Comment exceeds {} characters",
                    self.config.max_comment_len
                )));
            }
        }

        let now = Utc::now();
        let candidate = Score {
            id: ScoreId::generate(),
            tenant_id: ctx.tenant_id.clone(),
            category_id: category.id,
            contestant_id: submission.contestant_id,
            judge_id: judge.id,
            criterion_id: submission.criterion_id,
            score: Some(submission.value),
            comment,
            is_certified: false,
            is_locked: false,
            certified_by: None,
            certified_at: None,
            created_at: now,
            updated_at: now,
        };

        match storage.upsert_score(&candidate).await? {
            UpsertOutcome::Created(score) => {
                metrics::SCORES_SUBMITTED.with_label_values(&["created"]).inc();
                debug!(score_id = %score.id, value = submission.value, "Score created");
                Ok(score)
            }
            UpsertOutcome::Updated(score) => {
                metrics::SCORES_SUBMITTED.with_label_values(&["updated"]).inc();
                debug!(score_id = %score.id, value = submission.value, "Score updated");
                Ok(score)
            }
            UpsertOutcome::Locked(score) => {
                metrics::SCORES_SUBMITTED.with_label_values(&["locked"]).inc();
                Err(CertificationError::forbidden(format!(
                    "Score {} is locked and cannot be modified",
                    score.id
                )))
            }
            UpsertOutcome::Certified(score) => {
                metrics::SCORES_SUBMITTED.with_label_values(&["certified"]).inc();
                warn!(
                    score_id = %score.id,
                    judge_id = %score.judge_id,
                    "Revision of a certified score refused"
                );
                Err(CertificationError::forbidden(format!(
                    "Score {} is certified and needs an approved uncertification first",
                    score.id
                )))
            }
        }
    }

    /// Raw scores of a category. Judges only see their own rows; contestants
    /// and the emcee go through the winner service instead.
    pub async fn scores_for_category(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
    ) -> Result<Vec<Score>> {
        require_role(ctx, SCORE_READERS, "read raw scores")?;
        let storage = self.storage.as_ref();
        load_category(storage, ctx, category_id).await?;
        let scores = storage.list_scores(category_id).await?;
        if ctx.role != Role::Judge {
            return Ok(scores);
        }

        let mut own = HashSet::new();
        let judge_ids: HashSet<JudgeId> = scores.iter().map(|s| s.judge_id.clone()).collect();
        for judge_id in judge_ids {
            if let Some(judge) = storage.get_judge(&judge_id).await? {
                if judge.user_id.as_ref() == Some(&ctx.user_id) {
                    own.insert(judge_id);
                }
            }
        }
        debug!(category_id = %category_id, judges = own.len(), "Judge reading own scores");
        Ok(scores
            .into_iter()
            .filter(|s| own.contains(&s.judge_id))
            .collect())
    }

    /// Mark every uncertified score of the category certified, locking when asked.
    /// Locking is reserved to auditors and administrators.
    pub async fn certify_category_scores(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
        lock: bool,
    ) -> Result<usize> {
        if lock {
            require_role(ctx, &[Role::Auditor, Role::Admin], "lock scores")?;
        } else {
            require_role(ctx, CERTIFY_ROLES, "certify scores")?;
        }
        load_category(self.storage.as_ref(), ctx, category_id).await?;
        let updated = self
            .storage
            .certify_category_scores(category_id, &ctx.user_id, lock, Utc::now())
            .await?;
        metrics::SCORES_CERTIFIED.inc_by(updated as u64);
        info!(category_id = %category_id, updated, lock, "Category scores certified");
        Ok(updated)
    }
}

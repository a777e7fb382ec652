use crate::access::{assigned_judges, load_category};
use crate::error::{CertificationError, Result};
use crate::ledger::{append_entry, has_category_record, ledger_entry, reviewed_judges, SignOff};
use crate::metrics;
use chrono::Utc;
use podium_storage::{StorageBackend, StorageError};
use podium_types::{
    CategoryId, CertificationGate, LedgerEntry, LedgerScope, LifecycleState, RequestContext, Role,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of the auditor's category-level sign-off
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalCertification {
    pub entry: LedgerEntry,
    /// Score rows certified and locked by this step
    pub scores_locked: usize,
    /// Whether the category's workflow row moved past its auditor gate too
    pub workflow_advanced: bool,
}

/// Category-level final certification by the auditor.
///
/// Preconditions, checked in order:
/// 1. the caller is an AUDITOR;
/// 2. the category is not already auditor-certified;
/// 3. the tally master reviewed the totals of every assigned judge;
/// 4. no criterion score in the category is still uncertified.
pub struct AuditorCertificationService {
    storage: Arc<dyn StorageBackend>,
}

impl AuditorCertificationService {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    pub async fn submit_final_certification(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
        sign_off: SignOff,
    ) -> Result<FinalCertification> {
        if ctx.role != Role::Auditor {
            return Err(CertificationError::forbidden(
                "Only an auditor may submit final certification",
            ));
        }

        let storage = self.storage.as_ref();
        let category = load_category(storage, ctx, category_id).await?;
        let scope = LedgerScope::Category(category.id.clone());
        let entries = storage.list_ledger_entries(&scope).await?;

        if has_category_record(&entries, Role::Auditor) {
            return Err(CertificationError::conflict(
                "Category has already been certified by the auditor",
            ));
        }

        let judges = assigned_judges(storage, &category.id).await?;
        let reviewed = reviewed_judges(&entries);
        let outstanding = judges
            .iter()
            .filter(|a| !reviewed.contains(&a.judge_id))
            .count();
        if judges.is_empty() || outstanding > 0 {
            metrics::GUARD_FAILURES
                .with_label_values(&["final_certification"])
                .inc();
            return Err(CertificationError::validation(format!(
                "Tally master has reviewed {} of {} judges",
                reviewed.len().min(judges.len()),
                judges.len()
            )));
        }

        let uncertified = storage
            .list_scores(&category.id)
            .await?
            .iter()
            .filter(|s| s.criterion_id.is_some() && !s.is_certified)
            .count();
        if uncertified > 0 {
            metrics::GUARD_FAILURES
                .with_label_values(&["final_certification"])
                .inc();
            return Err(CertificationError::validation(format!(
                "{} scores are not yet certified",
                uncertified
            )));
        }

        let entry = ledger_entry(ctx, scope, Role::Auditor, None, sign_off);
        append_entry(storage, &entry, || {
            "Category has already been certified by the auditor".to_string()
        })
        .await?;

        let now = Utc::now();
        let scores_locked = storage
            .certify_category_scores(&category.id, &ctx.user_id, true, now)
            .await?;
        metrics::SCORES_CERTIFIED.inc_by(scores_locked as u64);

        let workflow_advanced = self.advance_workflow_row(ctx, &category.id).await?;

        info!(
            category_id = %category.id,
            auditor = %ctx.user_id,
            scores_locked,
            workflow_advanced,
            "Final certification submitted"
        );
        Ok(FinalCertification {
            entry,
            scores_locked,
            workflow_advanced,
        })
    }

    /// Mirror the ledger step onto the category's workflow row when it is waiting on the auditor
    async fn advance_workflow_row(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
    ) -> Result<bool> {
        let Some(mut cert) = self
            .storage
            .find_certification_for_category(category_id)
            .await?
        else {
            return Ok(false);
        };
        if cert.status.is_terminal() || !cert.tally_certified || cert.auditor_certified {
            return Ok(false);
        }

        cert.pass_gate(CertificationGate::Auditor, &ctx.user_id, Utc::now());
        match self.storage.update_certification_if(&cert).await {
            Ok(_) => {
                metrics::CERTIFICATION_TRANSITIONS
                    .with_label_values(&["auditor"])
                    .inc();
                Ok(true)
            }
            // A concurrent workflow transition got there first
            Err(StorageError::VersionConflict { .. }) => {
                debug!(certification_id = %cert.id, "Workflow row changed concurrently");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

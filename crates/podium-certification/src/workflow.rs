//! Aggregate certification workflow.
//!
//! One row per category moves through four ordered gates:
//!
//! ```text
//! PENDING ─judge─▶ IN_PROGRESS(2) ─tally─▶ IN_PROGRESS(3) ─auditor─▶ IN_PROGRESS(4) ─board─▶ CERTIFIED
//!    └───────────────────────── reject (any non-CERTIFIED state) ──────────────────────▶ REJECTED
//! ```
//!
//! Every gate is checked against the stored row and written back with a
//! version check, so two concurrent callers cannot both pass the same gate.
//! Each passed gate (after the judge's) also appends the matching record to
//! the role ledger.

use crate::access::{
    load_category, load_certification, load_contest, load_event, optional_text, require_role,
    validate_reason,
};
use crate::config::WorkflowConfig;
use crate::error::{CertificationError, Result};
use crate::ledger::{append_entry_if_absent, ledger_entry, SignOff};
use crate::metrics;
use chrono::Utc;
use podium_storage::{StorageBackend, StorageError};
use podium_types::{
    CategoryId, Certification, CertificationGate, CertificationId, CertificationStatus,
    ContestId, EventId, LedgerScope, LifecycleState, RequestContext, Role,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const MANAGE_ROLES: &[Role] = &[Role::Admin, Role::Organizer, Role::Board];
const REJECT_ROLES: &[Role] = &[Role::Admin, Role::Board, Role::Auditor, Role::TallyMaster];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCertification {
    pub event_id: EventId,
    pub contest_id: ContestId,
    pub category_id: CategoryId,
    pub notes: Option<String>,
}

/// Editable metadata; gates only move through the transition operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificationUpdate {
    pub notes: Option<String>,
}

fn gate_metric_label(gate: CertificationGate) -> &'static str {
    match gate {
        CertificationGate::Judge => "judge",
        CertificationGate::Tally => "tally",
        CertificationGate::Auditor => "auditor",
        CertificationGate::Board => "board",
    }
}

/// Ledger role written when a gate passes; the judge gate has no category-level record
fn ledger_role(gate: CertificationGate) -> Option<Role> {
    match gate {
        CertificationGate::Judge => None,
        CertificationGate::Tally => Some(Role::TallyMaster),
        CertificationGate::Auditor => Some(Role::Auditor),
        CertificationGate::Board => Some(Role::Board),
    }
}

pub struct CertificationWorkflow {
    storage: Arc<dyn StorageBackend>,
    config: WorkflowConfig,
}

impl CertificationWorkflow {
    pub fn new(storage: Arc<dyn StorageBackend>, config: WorkflowConfig) -> Self {
        Self { storage, config }
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        input: NewCertification,
    ) -> Result<Certification> {
        require_role(ctx, MANAGE_ROLES, "create certifications")?;
        let storage = self.storage.as_ref();
        let event = load_event(storage, ctx, &input.event_id).await?;
        let contest = load_contest(storage, ctx, &input.contest_id).await?;
        let category = load_category(storage, ctx, &input.category_id).await?;
        if contest.event_id != event.id || category.contest_id != contest.id {
            return Err(CertificationError::validation(
                "Category does not belong to the given contest and event",
            ));
        }

        let mut cert = Certification::new(
            ctx.tenant_id.clone(),
            event.id,
            contest.id,
            category.id,
        );
        cert.notes = optional_text(input.notes);

        match storage.insert_certification(&cert).await {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => {
                return Err(CertificationError::conflict(
                    "A certification already exists for this category",
                ))
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            certification_id = %cert.id,
            category_id = %cert.category_id,
            "Certification created"
        );
        Ok(cert)
    }

    pub async fn get(&self, ctx: &RequestContext, id: &CertificationId) -> Result<Certification> {
        load_certification(self.storage.as_ref(), ctx, id).await
    }

    pub async fn list(&self, ctx: &RequestContext) -> Result<Vec<Certification>> {
        Ok(self.storage.list_certifications(&ctx.tenant_id).await?)
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: &CertificationId,
        update: CertificationUpdate,
    ) -> Result<Certification> {
        require_role(ctx, MANAGE_ROLES, "edit certifications")?;
        let mut cert = load_certification(self.storage.as_ref(), ctx, id).await?;
        cert.notes = optional_text(update.notes);
        cert.updated_at = Utc::now();
        Ok(self.storage.update_certification_if(&cert).await?)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &CertificationId) -> Result<()> {
        require_role(ctx, &[Role::Admin], "delete certifications")?;
        let cert = load_certification(self.storage.as_ref(), ctx, id).await?;
        if cert.status == CertificationStatus::Certified {
            return Err(CertificationError::validation(
                "Cannot delete a finalized certification",
            ));
        }
        if !self.storage.delete_certification(id).await? {
            return Err(CertificationError::not_found("Certification", id));
        }
        warn!(certification_id = %id, user_id = %ctx.user_id, "Certification deleted");
        Ok(())
    }

    /// Judge gate: bulk-certifies the category's scores without locking them
    pub async fn certify_judge(
        &self,
        ctx: &RequestContext,
        id: &CertificationId,
    ) -> Result<Certification> {
        require_role(ctx, &[Role::Judge, Role::Admin], "certify as judge")?;
        let cert = self.pass_gate(ctx, id, CertificationGate::Judge).await?;

        let certified = self
            .storage
            .certify_category_scores(&cert.category_id, &ctx.user_id, false, Utc::now())
            .await?;
        metrics::SCORES_CERTIFIED.inc_by(certified as u64);
        Ok(cert)
    }

    pub async fn certify_tally(
        &self,
        ctx: &RequestContext,
        id: &CertificationId,
    ) -> Result<Certification> {
        require_role(ctx, &[Role::TallyMaster, Role::Admin], "certify as tally master")?;
        self.pass_gate(ctx, id, CertificationGate::Tally).await
    }

    /// Auditor gate: certifies and locks every score of the category
    pub async fn certify_auditor(
        &self,
        ctx: &RequestContext,
        id: &CertificationId,
    ) -> Result<Certification> {
        require_role(ctx, &[Role::Auditor, Role::Admin], "certify as auditor")?;
        let cert = self.pass_gate(ctx, id, CertificationGate::Auditor).await?;

        let locked = self
            .storage
            .certify_category_scores(&cert.category_id, &ctx.user_id, true, Utc::now())
            .await?;
        metrics::SCORES_CERTIFIED.inc_by(locked as u64);
        Ok(cert)
    }

    /// Board gate: final approval, the row becomes CERTIFIED
    pub async fn approve_board(
        &self,
        ctx: &RequestContext,
        id: &CertificationId,
    ) -> Result<Certification> {
        require_role(ctx, &[Role::Board, Role::Admin], "approve as board")?;
        self.pass_gate(ctx, id, CertificationGate::Board).await
    }

    pub async fn reject(
        &self,
        ctx: &RequestContext,
        id: &CertificationId,
        reason: &str,
    ) -> Result<Certification> {
        require_role(ctx, REJECT_ROLES, "reject certifications")?;
        let mut cert = load_certification(self.storage.as_ref(), ctx, id).await?;

        match cert.status {
            CertificationStatus::Certified => {
                metrics::GUARD_FAILURES.with_label_values(&["reject"]).inc();
                return Err(CertificationError::validation(
                    "Cannot reject a finalized certification",
                ));
            }
            CertificationStatus::Rejected => {
                return Err(CertificationError::validation(
                    "Certification has already been rejected",
                ));
            }
            CertificationStatus::Pending | CertificationStatus::InProgress => {}
        }
        let reason = validate_reason(&self.config, reason)?;

        cert.status = CertificationStatus::Rejected;
        cert.rejection_reason = Some(reason);
        cert.updated_at = Utc::now();
        let cert = self.storage.update_certification_if(&cert).await?;

        metrics::CERTIFICATION_REJECTIONS.inc();
        warn!(
            certification_id = %cert.id,
            category_id = %cert.category_id,
            user_id = %ctx.user_id,
            "Certification rejected"
        );
        Ok(cert)
    }

    /// Check the gate's guard against the stored row, then write it back conditionally
    async fn pass_gate(
        &self,
        ctx: &RequestContext,
        id: &CertificationId,
        gate: CertificationGate,
    ) -> Result<Certification> {
        let mut cert = load_certification(self.storage.as_ref(), ctx, id).await?;
        let operation = format!("certify_{}", gate_metric_label(gate));

        if let Err(e) = Self::check_gate(&cert, gate) {
            metrics::GUARD_FAILURES
                .with_label_values(&[operation.as_str()])
                .inc();
            return Err(e);
        }

        let next = if gate == CertificationGate::Board {
            CertificationStatus::Certified
        } else {
            CertificationStatus::InProgress
        };
        if !cert.status.can_transition_to(&next) {
            return Err(CertificationError::validation(format!(
                "Certification cannot move from {:?} to {:?}",
                cert.status, next
            )));
        }

        cert.pass_gate(gate, &ctx.user_id, Utc::now());
        let cert = self.storage.update_certification_if(&cert).await?;

        if let Some(role) = ledger_role(gate) {
            let entry = ledger_entry(
                ctx,
                LedgerScope::Category(cert.category_id.clone()),
                role,
                None,
                SignOff::default(),
            );
            append_entry_if_absent(self.storage.as_ref(), &entry).await?;
        }

        metrics::CERTIFICATION_TRANSITIONS
            .with_label_values(&[gate_metric_label(gate)])
            .inc();
        info!(
            certification_id = %cert.id,
            category_id = %cert.category_id,
            gate = gate.label(),
            step = cert.current_step,
            status = ?cert.status,
            user_id = %ctx.user_id,
            "Certification gate passed"
        );
        Ok(cert)
    }

    fn check_gate(cert: &Certification, gate: CertificationGate) -> Result<()> {
        if cert.status == CertificationStatus::Rejected {
            return Err(CertificationError::validation(
                "Certification has been rejected",
            ));
        }
        if let Some(previous) = gate.previous() {
            if !cert.gate(previous) {
                return Err(CertificationError::validation(format!(
                    "{} must certify first",
                    previous.label()
                )));
            }
        }
        if cert.gate(gate) {
            return Err(CertificationError::validation(format!(
                "{} certification already completed",
                gate.label()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use podium_types::UserId;

    fn row() -> Certification {
        Certification::new(
            "t".into(),
            EventId::new("e"),
            ContestId::new("c"),
            CategoryId::new("k"),
        )
    }

    #[test]
    fn test_gate_guard_messages() {
        let mut cert = row();
        let err = CertificationWorkflow::check_gate(&cert, CertificationGate::Tally).unwrap_err();
        assert_eq!(err.to_string(), "Judge must certify first");

        cert.pass_gate(CertificationGate::Judge, &UserId::new("u"), Utc::now());
        let err = CertificationWorkflow::check_gate(&cert, CertificationGate::Judge).unwrap_err();
        assert_eq!(err.to_string(), "Judge certification already completed");
        assert!(CertificationWorkflow::check_gate(&cert, CertificationGate::Tally).is_ok());

        let err =
            CertificationWorkflow::check_gate(&cert, CertificationGate::Board).unwrap_err();
        assert_eq!(err.to_string(), "Auditor must certify first");
    }

    #[test]
    fn test_rejected_row_accepts_no_gate() {
        let mut cert = row();
        cert.status = CertificationStatus::Rejected;
        for gate in CertificationGate::ORDER {
            assert!(CertificationWorkflow::check_gate(&cert, gate).is_err());
        }
    }
}

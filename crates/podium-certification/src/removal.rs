//! Score removal and judge uncertification requests.
//!
//! A request needs one signature from each of the auditor, tally master and
//! board before it can be executed. Signatures are written by a conditional
//! slot fill in storage, so a role can sign exactly once even under
//! concurrent requests.

use crate::access::{
    load_category, load_contestant, load_judge, load_request, require_role, validate_reason,
};
use crate::config::WorkflowConfig;
use crate::error::{CertificationError, Result};
use crate::metrics;
use chrono::Utc;
use podium_storage::{ExecutionOutcome, SignatureOutcome, StorageBackend};
use podium_types::{
    CategoryId, ContestantId, JudgeId, RequestContext, RequestId, RequestKind, RequestStatus,
    Role, SignOffRequest, Signature,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const INITIATOR_ROLES: &[Role] = &[Role::Board, Role::Admin];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRequest {
    pub kind: RequestKind,
    pub category_id: CategoryId,
    pub judge_id: JudgeId,
    pub contestant_id: Option<ContestantId>,
    pub reason: String,
}

/// Result of executing an approved request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub request: SignOffRequest,
    pub scores_affected: usize,
}

fn kind_label(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::ScoreRemoval => "score_removal",
        RequestKind::JudgeUncertification => "judge_uncertification",
    }
}

pub struct RemovalWorkflow {
    storage: Arc<dyn StorageBackend>,
    config: WorkflowConfig,
}

impl RemovalWorkflow {
    pub fn new(storage: Arc<dyn StorageBackend>, config: WorkflowConfig) -> Self {
        Self { storage, config }
    }

    pub async fn create_request(
        &self,
        ctx: &RequestContext,
        input: NewRequest,
    ) -> Result<SignOffRequest> {
        require_role(ctx, INITIATOR_ROLES, "initiate removal requests")?;
        let storage = self.storage.as_ref();
        let category = load_category(storage, ctx, &input.category_id).await?;
        let judge = load_judge(storage, ctx, &input.judge_id).await?;
        if let Some(contestant_id) = &input.contestant_id {
            load_contestant(storage, ctx, contestant_id).await?;
        }
        let reason = validate_reason(&self.config, &input.reason)?;

        let request = SignOffRequest {
            id: RequestId::generate(),
            tenant_id: ctx.tenant_id.clone(),
            kind: input.kind,
            category_id: category.id,
            judge_id: judge.id,
            contestant_id: input.contestant_id,
            reason,
            requested_by: ctx.user_id.clone(),
            status: RequestStatus::Pending,
            auditor_signature: None,
            tally_signature: None,
            board_signature: None,
            approved_at: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        storage.insert_request(&request).await?;

        info!(
            request_id = %request.id,
            kind = kind_label(request.kind),
            category_id = %request.category_id,
            judge_id = %request.judge_id,
            "Request created"
        );
        Ok(request)
    }

    /// Fill the caller's role slot; the third signature approves the request
    pub async fn sign_request(
        &self,
        ctx: &RequestContext,
        id: &RequestId,
        signature_name: &str,
    ) -> Result<SignOffRequest> {
        if !ctx.role.is_signatory() {
            return Err(CertificationError::forbidden(format!(
                "Role {} does not sign removal requests",
                ctx.role
            )));
        }
        let signature_name = signature_name.trim();
        if signature_name.is_empty() {
            return Err(CertificationError::validation("A signature name is required"));
        }
        load_request(self.storage.as_ref(), ctx, id).await?;

        let signature = Signature {
            signer_id: ctx.user_id.clone(),
            signature_name: signature_name.to_string(),
            signed_at: Utc::now(),
        };

        match self.storage.fill_signature(id, ctx.role, signature).await? {
            SignatureOutcome::Filled(request) => {
                metrics::SIGNATURES_RECORDED
                    .with_label_values(&[ctx.role.as_str()])
                    .inc();
                info!(
                    request_id = %request.id,
                    role = %ctx.role,
                    signatures = request.signature_count(),
                    status = ?request.status,
                    "Request signed"
                );
                Ok(request)
            }
            SignatureOutcome::SlotTaken(_) => Err(CertificationError::conflict(
                "You have already signed this request or your signature is not required",
            )),
            SignatureOutcome::NotPending(status) => Err(CertificationError::validation(format!(
                "Request is {:?} and no longer accepts signatures",
                status
            ))),
            SignatureOutcome::NoSlot(role) => Err(CertificationError::forbidden(format!(
                "Role {} has no signature on this request",
                role
            ))),
        }
    }

    /// Apply an approved request: delete (removal) or uncertify (uncertification)
    /// every score of the request's (category, judge) pair, then mark it COMPLETED
    pub async fn execute(&self, ctx: &RequestContext, id: &RequestId) -> Result<ExecutionReport> {
        require_role(ctx, INITIATOR_ROLES, "execute removal requests")?;
        load_request(self.storage.as_ref(), ctx, id).await?;

        match self.storage.execute_request(id, Utc::now()).await? {
            ExecutionOutcome::Applied {
                request,
                scores_affected,
            } => {
                metrics::REQUESTS_EXECUTED
                    .with_label_values(&[kind_label(request.kind)])
                    .inc();
                warn!(
                    request_id = %request.id,
                    kind = kind_label(request.kind),
                    category_id = %request.category_id,
                    judge_id = %request.judge_id,
                    scores_affected,
                    "Request executed"
                );
                Ok(ExecutionReport {
                    request,
                    scores_affected,
                })
            }
            ExecutionOutcome::NotApproved(status) => {
                metrics::GUARD_FAILURES
                    .with_label_values(&["execute_request"])
                    .inc();
                Err(CertificationError::validation(format!(
                    "Request must be approved before execution (status {:?})",
                    status
                )))
            }
        }
    }

    pub async fn get(&self, ctx: &RequestContext, id: &RequestId) -> Result<SignOffRequest> {
        load_request(self.storage.as_ref(), ctx, id).await
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        status: Option<RequestStatus>,
    ) -> Result<Vec<SignOffRequest>> {
        Ok(self
            .storage
            .list_requests(&ctx.tenant_id)
            .await?
            .into_iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect())
    }
}

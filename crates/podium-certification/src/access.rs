//! Tenant-scoped record loading and role guards shared by the services.
//!
//! A record owned by another tenant is reported exactly like a missing one.

use crate::config::WorkflowConfig;
use crate::error::{CertificationError, Result};
use podium_storage::StorageBackend;
use podium_types::{
    Assignment, AssignmentStatus, Category, CategoryId, Certification, CertificationId, Contest,
    ContestId, Contestant, ContestantId, Event, EventId, Judge, JudgeId, RequestContext, RequestId,
    Role, SignOffRequest, TenantId,
};
use std::collections::HashSet;
use std::fmt::Display;

fn owned<T>(
    ctx: &RequestContext,
    record: Option<T>,
    tenant: impl Fn(&T) -> &TenantId,
    entity: &'static str,
    id: &impl Display,
) -> Result<T> {
    match record {
        Some(record) if tenant(&record) == &ctx.tenant_id => Ok(record),
        _ => Err(CertificationError::not_found(entity, id)),
    }
}

pub(crate) async fn load_event(
    storage: &dyn StorageBackend,
    ctx: &RequestContext,
    id: &EventId,
) -> Result<Event> {
    owned(ctx, storage.get_event(id).await?, |e| &e.tenant_id, "Event", id)
}

pub(crate) async fn load_contest(
    storage: &dyn StorageBackend,
    ctx: &RequestContext,
    id: &ContestId,
) -> Result<Contest> {
    owned(ctx, storage.get_contest(id).await?, |c| &c.tenant_id, "Contest", id)
}

pub(crate) async fn load_category(
    storage: &dyn StorageBackend,
    ctx: &RequestContext,
    id: &CategoryId,
) -> Result<Category> {
    owned(ctx, storage.get_category(id).await?, |c| &c.tenant_id, "Category", id)
}

pub(crate) async fn load_judge(
    storage: &dyn StorageBackend,
    ctx: &RequestContext,
    id: &JudgeId,
) -> Result<Judge> {
    owned(ctx, storage.get_judge(id).await?, |j| &j.tenant_id, "Judge", id)
}

pub(crate) async fn load_contestant(
    storage: &dyn StorageBackend,
    ctx: &RequestContext,
    id: &ContestantId,
) -> Result<Contestant> {
    owned(
        ctx,
        storage.get_contestant(id).await?,
        |c| &c.tenant_id,
        "Contestant",
        id,
    )
}

pub(crate) async fn load_certification(
    storage: &dyn StorageBackend,
    ctx: &RequestContext,
    id: &CertificationId,
) -> Result<Certification> {
    owned(
        ctx,
        storage.get_certification(id).await?,
        |c| &c.tenant_id,
        "Certification",
        id,
    )
}

pub(crate) async fn load_request(
    storage: &dyn StorageBackend,
    ctx: &RequestContext,
    id: &RequestId,
) -> Result<SignOffRequest> {
    owned(ctx, storage.get_request(id).await?, |r| &r.tenant_id, "Request", id)
}

/// Judges currently holding a non-removed assignment to the category
pub(crate) async fn assigned_judges(
    storage: &dyn StorageBackend,
    category_id: &CategoryId,
) -> Result<Vec<Assignment>> {
    let mut seen = HashSet::new();
    Ok(storage
        .list_assignments(category_id)
        .await?
        .into_iter()
        .filter(|a| a.status != AssignmentStatus::Removed)
        .filter(|a| seen.insert(a.judge_id.clone()))
        .collect())
}

pub(crate) fn require_role(ctx: &RequestContext, allowed: &[Role], action: &str) -> Result<()> {
    if allowed.contains(&ctx.role) {
        Ok(())
    } else {
        Err(CertificationError::forbidden(format!(
            "Role {} may not {}",
            ctx.role, action
        )))
    }
}

/// Normalise a free-text reason per the workflow settings
pub(crate) fn validate_reason(config: &WorkflowConfig, reason: &str) -> Result<String> {
    let reason = if config.require_trimmed_reason {
        reason.trim()
    } else {
        reason
    };

    if reason.trim().is_empty() {
        return Err(CertificationError::validation("A reason is required"));
    }
    if reason.chars().count() > config.max_reason_len {
        return Err(CertificationError::validation(format!(
            "Reason exceeds {} characters",
            config.max_reason_len
        )));
    }
    Ok(reason.to_string())
}

/// Trim an optional free-text field, dropping it when blank
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

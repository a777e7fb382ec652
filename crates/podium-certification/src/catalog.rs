//! Minimal catalog maintenance: the events, contests, categories and people
//! the certification workflow reads.

use crate::access::{
    load_category, load_contest, load_contestant, load_event, load_judge, optional_text,
    require_role,
};
use crate::error::{CertificationError, Result};
use chrono::Utc;
use podium_storage::StorageBackend;
use podium_types::{
    Assignment, AssignmentId, AssignmentStatus, Category, CategoryId, Contest, ContestId,
    Contestant, ContestantId, Criterion, CriterionId, DeductionId, Event, EventId, Judge, JudgeId,
    OverallDeduction, RequestContext, Role, UserId,
};
use std::sync::Arc;
use tracing::info;

const CATALOG_ROLES: &[Role] = &[Role::Admin, Role::Organizer];
const DEDUCTION_ROLES: &[Role] = &[Role::Admin, Role::Organizer, Role::Board];

fn required_name(name: &str, what: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CertificationError::validation(format!("{what} name is required")));
    }
    Ok(name.to_string())
}

pub struct CatalogService {
    storage: Arc<dyn StorageBackend>,
}

impl CatalogService {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    pub async fn create_event(&self, ctx: &RequestContext, name: &str) -> Result<Event> {
        require_role(ctx, CATALOG_ROLES, "manage events")?;
        let event = Event {
            id: EventId::generate(),
            tenant_id: ctx.tenant_id.clone(),
            name: required_name(name, "Event")?,
            archived: false,
            created_at: Utc::now(),
        };
        self.storage.put_event(&event).await?;
        info!(event_id = %event.id, name = %event.name, "Event created");
        Ok(event)
    }

    pub async fn get_event(&self, ctx: &RequestContext, id: &EventId) -> Result<Event> {
        load_event(self.storage.as_ref(), ctx, id).await
    }

    pub async fn create_contest(
        &self,
        ctx: &RequestContext,
        event_id: &EventId,
        name: &str,
    ) -> Result<Contest> {
        require_role(ctx, CATALOG_ROLES, "manage contests")?;
        let event = load_event(self.storage.as_ref(), ctx, event_id).await?;
        if event.archived {
            return Err(CertificationError::validation("Event is archived"));
        }

        let contest = Contest {
            id: ContestId::generate(),
            tenant_id: ctx.tenant_id.clone(),
            event_id: event.id,
            name: required_name(name, "Contest")?,
            created_at: Utc::now(),
        };
        self.storage.put_contest(&contest).await?;
        info!(contest_id = %contest.id, event_id = %contest.event_id, "Contest created");
        Ok(contest)
    }

    pub async fn get_contest(&self, ctx: &RequestContext, id: &ContestId) -> Result<Contest> {
        load_contest(self.storage.as_ref(), ctx, id).await
    }

    pub async fn list_contests(
        &self,
        ctx: &RequestContext,
        event_id: &EventId,
    ) -> Result<Vec<Contest>> {
        load_event(self.storage.as_ref(), ctx, event_id).await?;
        Ok(self.storage.list_contests(event_id).await?)
    }

    pub async fn create_category(
        &self,
        ctx: &RequestContext,
        contest_id: &ContestId,
        name: &str,
    ) -> Result<Category> {
        require_role(ctx, CATALOG_ROLES, "manage categories")?;
        let contest = load_contest(self.storage.as_ref(), ctx, contest_id).await?;

        let category = Category {
            id: CategoryId::generate(),
            tenant_id: ctx.tenant_id.clone(),
            contest_id: contest.id,
            name: required_name(name, "Category")?,
            contestant_ids: Vec::new(),
            created_at: Utc::now(),
        };
        self.storage.put_category(&category).await?;
        info!(category_id = %category.id, contest_id = %category.contest_id, "Category created");
        Ok(category)
    }

    pub async fn get_category(&self, ctx: &RequestContext, id: &CategoryId) -> Result<Category> {
        load_category(self.storage.as_ref(), ctx, id).await
    }

    pub async fn list_categories(
        &self,
        ctx: &RequestContext,
        contest_id: &ContestId,
    ) -> Result<Vec<Category>> {
        load_contest(self.storage.as_ref(), ctx, contest_id).await?;
        Ok(self.storage.list_categories(contest_id).await?)
    }

    pub async fn add_criterion(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
        name: &str,
        max_score: f64,
    ) -> Result<Criterion> {
        require_role(ctx, CATALOG_ROLES, "manage criteria")?;
        let category = load_category(self.storage.as_ref(), ctx, category_id).await?;
        if !max_score.is_finite() || max_score <= 0.0 {
            return Err(CertificationError::validation(
                "Criterion max score must be a positive number",
            ));
        }

        let criterion = Criterion {
            id: CriterionId::generate(),
            tenant_id: ctx.tenant_id.clone(),
            category_id: category.id,
            name: required_name(name, "Criterion")?,
            max_score,
        };
        self.storage.put_criterion(&criterion).await?;
        Ok(criterion)
    }

    pub async fn list_criteria(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
    ) -> Result<Vec<Criterion>> {
        load_category(self.storage.as_ref(), ctx, category_id).await?;
        Ok(self.storage.list_criteria(category_id).await?)
    }

    pub async fn create_judge(
        &self,
        ctx: &RequestContext,
        name: &str,
        user_id: Option<UserId>,
    ) -> Result<Judge> {
        require_role(ctx, CATALOG_ROLES, "manage judges")?;
        let judge = Judge {
            id: JudgeId::generate(),
            tenant_id: ctx.tenant_id.clone(),
            name: required_name(name, "Judge")?,
            user_id,
        };
        self.storage.put_judge(&judge).await?;
        Ok(judge)
    }

    pub async fn get_judge(&self, ctx: &RequestContext, id: &JudgeId) -> Result<Judge> {
        load_judge(self.storage.as_ref(), ctx, id).await
    }

    pub async fn create_contestant(
        &self,
        ctx: &RequestContext,
        name: &str,
        contestant_number: Option<u32>,
    ) -> Result<Contestant> {
        require_role(ctx, CATALOG_ROLES, "manage contestants")?;
        let contestant = Contestant {
            id: ContestantId::generate(),
            tenant_id: ctx.tenant_id.clone(),
            name: required_name(name, "Contestant")?,
            contestant_number,
        };
        self.storage.put_contestant(&contestant).await?;
        Ok(contestant)
    }

    pub async fn get_contestant(
        &self,
        ctx: &RequestContext,
        id: &ContestantId,
    ) -> Result<Contestant> {
        load_contestant(self.storage.as_ref(), ctx, id).await
    }

    /// Enter a contestant into a category; entering twice is a no-op
    pub async fn enroll_contestant(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
        contestant_id: &ContestantId,
    ) -> Result<Category> {
        require_role(ctx, CATALOG_ROLES, "manage categories")?;
        let mut category = load_category(self.storage.as_ref(), ctx, category_id).await?;
        load_contestant(self.storage.as_ref(), ctx, contestant_id).await?;

        if !category.contestant_ids.contains(contestant_id) {
            category.contestant_ids.push(contestant_id.clone());
            self.storage.put_category(&category).await?;
        }
        Ok(category)
    }

    /// Assign a judge to a category, or change the status of an existing assignment
    pub async fn assign_judge(
        &self,
        ctx: &RequestContext,
        judge_id: &JudgeId,
        category_id: &CategoryId,
        status: AssignmentStatus,
    ) -> Result<Assignment> {
        require_role(ctx, CATALOG_ROLES, "assign judges")?;
        load_judge(self.storage.as_ref(), ctx, judge_id).await?;
        load_category(self.storage.as_ref(), ctx, category_id).await?;

        let existing = self
            .storage
            .list_assignments(category_id)
            .await?
            .into_iter()
            .find(|a| &a.judge_id == judge_id);

        let assignment = match existing {
            Some(mut assignment) => {
                assignment.status = status;
                assignment
            }
            None => Assignment {
                id: AssignmentId::generate(),
                tenant_id: ctx.tenant_id.clone(),
                judge_id: judge_id.clone(),
                category_id: category_id.clone(),
                status,
                assigned_at: Utc::now(),
            },
        };
        self.storage.put_assignment(&assignment).await?;
        info!(
            judge_id = %judge_id,
            category_id = %category_id,
            status = ?assignment.status,
            "Judge assignment recorded"
        );
        Ok(assignment)
    }

    pub async fn list_assignments(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
    ) -> Result<Vec<Assignment>> {
        load_category(self.storage.as_ref(), ctx, category_id).await?;
        Ok(self.storage.list_assignments(category_id).await?)
    }

    pub async fn add_deduction(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
        contestant_id: &ContestantId,
        amount: f64,
        reason: &str,
    ) -> Result<OverallDeduction> {
        require_role(ctx, DEDUCTION_ROLES, "record deductions")?;
        let category = load_category(self.storage.as_ref(), ctx, category_id).await?;
        if !category.contestant_ids.contains(contestant_id) {
            return Err(CertificationError::validation(
                "Contestant is not entered in this category",
            ));
        }
        if !amount.is_finite() || amount < 0.0 {
            return Err(CertificationError::validation(
                "Deduction amount must be zero or more",
            ));
        }
        let reason = optional_text(Some(reason.to_string()))
            .ok_or_else(|| CertificationError::validation("A reason is required"))?;

        let deduction = OverallDeduction {
            id: DeductionId::generate(),
            tenant_id: ctx.tenant_id.clone(),
            category_id: category_id.clone(),
            contestant_id: contestant_id.clone(),
            amount,
            reason,
            created_by: ctx.user_id.clone(),
            created_at: Utc::now(),
        };
        self.storage.put_deduction(&deduction).await?;
        info!(
            category_id = %category_id,
            contestant_id = %contestant_id,
            amount,
            "Deduction recorded"
        );
        Ok(deduction)
    }
}

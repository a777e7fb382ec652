//! HTTP API
//!
//! Caller identity is established upstream and forwarded in the
//! `x-tenant-id`, `x-user-id` and `x-user-role` headers. Every handler
//! builds a [`RequestContext`] from them and hands it to the services;
//! service errors map onto status codes through [`ApiError`].

use crate::metrics::Metrics;
use crate::node::{NodeStats, PodiumNode, TablePage};
use anyhow::Context;
use axum::{
    async_trait,
    extract::{FromRequestParts, MatchedPath, Path, Query, Request, State},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use podium_certification::{
    CategoryProgress, CategoryWinners, CertificationError, CertificationUpdate, ContestWinners,
    EventWinners, ExecutionReport, FinalCertification, NewCertification, NewRequest,
    ScoreSubmission, SignOff,
};
use podium_storage::ResetSummary;
use podium_types::{
    Assignment, AssignmentStatus, Category, CategoryId, Certification, CertificationId, Contest,
    ContestId, Contestant, ContestantId, Criterion, EntityKind, Event, EventId, Judge,
    JudgeContestantCertification, JudgeId, LedgerEntry, OverallDeduction, RequestContext,
    RequestId, RequestStatus, Role, Score, SignOffRequest, TenantId, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";

const MAX_PAGE: usize = 500;

#[derive(Clone)]
pub struct ApiState {
    pub node: PodiumNode,
    pub metrics: Metrics,
}

type SharedState = State<Arc<ApiState>>;

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// Identity headers missing or malformed
    Unauthenticated(String),
    Service(CertificationError),
    Internal(anyhow::Error),
}

impl From<CertificationError> for ApiError {
    fn from(e: CertificationError) -> Self {
        Self::Service(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, error) = match self {
            ApiError::Unauthenticated(message) => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated".to_string(),
                message,
            ),
            ApiError::Service(e) => {
                let status = StatusCode::from_u16(e.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let kind = serde_json::to_value(e.kind())
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_else(|| "service".to_string());
                (status, kind, e.to_string())
            }
            ApiError::Internal(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "service".to_string(),
                e.to_string(),
            ),
        };

        if status.is_server_error() {
            warn!(error = %error, "Request failed");
        } else {
            debug!(status = status.as_u16(), error = %error, "Request refused");
        }
        (status, Json(ErrorResponse { error, kind })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;
type Created<T> = Result<(StatusCode, Json<T>), ApiError>;

fn created<T>(value: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(value)))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated(format!("Missing {} header", name)))
}

/// Build the caller's context from the identity headers
pub fn caller_from_headers(headers: &HeaderMap) -> Result<RequestContext, ApiError> {
    let tenant = header(headers, TENANT_HEADER)?;
    let user = header(headers, USER_HEADER)?;
    let role: Role = header(headers, ROLE_HEADER)?
        .parse()
        .map_err(|e: podium_types::TypesError| ApiError::Unauthenticated(e.to_string()))?;
    Ok(RequestContext::new(
        TenantId::new(tenant),
        UserId::new(user),
        role,
    ))
}

/// Authenticated caller extracted from request headers
pub struct Caller(pub RequestContext);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers).map(Caller)
    }
}

fn require_admin(ctx: &RequestContext) -> Result<(), ApiError> {
    if ctx.role == Role::Admin {
        Ok(())
    } else {
        Err(CertificationError::forbidden("Administrator access required").into())
    }
}

// ---------- request bodies ----------

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CriterionRequest {
    pub name: String,
    pub max_score: f64,
}

#[derive(Debug, Deserialize)]
pub struct JudgeRequest {
    pub name: String,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct ContestantRequest {
    pub name: String,
    pub contestant_number: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub contestant_id: ContestantId,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub judge_id: JudgeId,
    #[serde(default = "default_assignment_status")]
    pub status: AssignmentStatus,
}

fn default_assignment_status() -> AssignmentStatus {
    AssignmentStatus::Active
}

#[derive(Debug, Deserialize)]
pub struct DeductionRequest {
    pub contestant_id: ContestantId,
    pub amount: f64,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct SignRequest {
    pub signature_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestsQuery {
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

// ---------- router ----------

pub fn router(node: PodiumNode) -> Router {
    let state = Arc::new(ApiState {
        node,
        metrics: Metrics::new(),
    });

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/stats", get(get_stats))
        .route("/admin/tables/:table", get(browse_table))
        // catalog
        .route("/events", post(create_event))
        .route("/events/:id", get(get_event))
        .route("/events/:id/contests", get(list_contests).post(create_contest))
        .route("/contests/:id", get(get_contest))
        .route("/contests/:id/categories", get(list_categories).post(create_category))
        .route("/categories/:id", get(get_category))
        .route("/categories/:id/criteria", get(list_criteria).post(add_criterion))
        .route("/categories/:id/contestants", post(enroll_contestant))
        .route("/categories/:id/assignments", get(list_assignments).post(assign_judge))
        .route("/categories/:id/deductions", post(add_deduction))
        .route("/judges", post(create_judge))
        .route("/contestants", post(create_contestant))
        // scores
        .route("/scores", post(submit_score))
        .route("/categories/:id/scores", get(list_scores))
        // aggregate workflow
        .route("/certifications", get(list_certifications).post(create_certification))
        .route(
            "/certifications/:id",
            get(get_certification)
                .put(update_certification)
                .delete(delete_certification),
        )
        .route("/certifications/:id/certify-judge", post(certify_judge))
        .route("/certifications/:id/certify-tally", post(certify_tally))
        .route("/certifications/:id/certify-auditor", post(certify_auditor))
        .route("/certifications/:id/approve-board", post(approve_board))
        .route("/certifications/:id/reject", post(reject_certification))
        // role ledger
        .route("/categories/:id/certify", post(certify_category))
        .route("/categories/:id/certification-progress", get(category_progress))
        .route("/categories/:id/final-certification", post(final_certification))
        .route("/categories/:id/certifications/reset", post(reset_category))
        .route("/categories/:id/judges/:judge_id/review", post(review_judge_totals))
        .route(
            "/categories/:id/judges/:judge_id/contestants/:contestant_id/certify",
            post(certify_judge_contestant),
        )
        .route("/contests/:id/certify", post(certify_contest))
        // removal / uncertification
        .route("/requests", get(list_requests).post(create_request))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/sign", post(sign_request))
        .route("/requests/:id/execute", post(execute_request))
        // winners
        .route("/winners/categories/:id", get(category_winners))
        .route("/winners/contests/:id", get(contest_winners))
        .route("/winners/events/:id", get(event_winners))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
}

pub async fn start_api_server(
    node: PodiumNode,
    host: &str,
    port: u16,
) -> anyhow::Result<JoinHandle<()>> {
    let app = router(node);
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;
    info!(addr = %addr, "API server listening");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "API server stopped");
        }
    }))
}

async fn track_requests(
    State(state): SharedState,
    matched: Option<MatchedPath>,
    request: Request,
    next: Next,
) -> Response {
    let route = matched
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let response = next.run(request).await;

    state.metrics.api_requests.with_label_values(&[&route]).inc();
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        state
            .metrics
            .api_errors
            .with_label_values(&[status.as_str()])
            .inc();
    }
    response
}

// ---------- operational ----------

async fn health() -> &'static str {
    "OK"
}

async fn get_metrics(State(state): SharedState) -> String {
    state.metrics.gather()
}

async fn get_stats(State(state): SharedState, Caller(ctx): Caller) -> ApiResult<NodeStats> {
    require_admin(&ctx)?;
    Ok(Json(state.node.stats().await?))
}

async fn browse_table(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(table): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<TablePage> {
    require_admin(&ctx)?;
    let kind = EntityKind::from_table_name(&table)
        .map_err(|_| CertificationError::not_found("Table", &table))?;
    let limit = page.limit.min(MAX_PAGE);
    Ok(Json(state.node.browse(kind, page.offset, limit).await?))
}

// ---------- catalog ----------

async fn create_event(
    State(state): SharedState,
    Caller(ctx): Caller,
    Json(req): Json<NameRequest>,
) -> Created<Event> {
    created(state.node.services.catalog.create_event(&ctx, &req.name).await?)
}

async fn get_event(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<EventId>,
) -> ApiResult<Event> {
    Ok(Json(state.node.services.catalog.get_event(&ctx, &id).await?))
}

async fn create_contest(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<EventId>,
    Json(req): Json<NameRequest>,
) -> Created<Contest> {
    created(
        state
            .node
            .services
            .catalog
            .create_contest(&ctx, &id, &req.name)
            .await?,
    )
}

async fn list_contests(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<EventId>,
) -> ApiResult<Vec<Contest>> {
    Ok(Json(state.node.services.catalog.list_contests(&ctx, &id).await?))
}

async fn get_contest(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<ContestId>,
) -> ApiResult<Contest> {
    Ok(Json(state.node.services.catalog.get_contest(&ctx, &id).await?))
}

async fn create_category(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<ContestId>,
    Json(req): Json<NameRequest>,
) -> Created<Category> {
    created(
        state
            .node
            .services
            .catalog
            .create_category(&ctx, &id, &req.name)
            .await?,
    )
}

async fn list_categories(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<ContestId>,
) -> ApiResult<Vec<Category>> {
    Ok(Json(state.node.services.catalog.list_categories(&ctx, &id).await?))
}

async fn get_category(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CategoryId>,
) -> ApiResult<Category> {
    Ok(Json(state.node.services.catalog.get_category(&ctx, &id).await?))
}

async fn add_criterion(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CategoryId>,
    Json(req): Json<CriterionRequest>,
) -> Created<Criterion> {
    created(
        state
            .node
            .services
            .catalog
            .add_criterion(&ctx, &id, &req.name, req.max_score)
            .await?,
    )
}

async fn list_criteria(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CategoryId>,
) -> ApiResult<Vec<Criterion>> {
    Ok(Json(state.node.services.catalog.list_criteria(&ctx, &id).await?))
}

async fn enroll_contestant(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CategoryId>,
    Json(req): Json<EnrollRequest>,
) -> ApiResult<Category> {
    Ok(Json(
        state
            .node
            .services
            .catalog
            .enroll_contestant(&ctx, &id, &req.contestant_id)
            .await?,
    ))
}

async fn assign_judge(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CategoryId>,
    Json(req): Json<AssignRequest>,
) -> ApiResult<Assignment> {
    Ok(Json(
        state
            .node
            .services
            .catalog
            .assign_judge(&ctx, &req.judge_id, &id, req.status)
            .await?,
    ))
}

async fn list_assignments(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CategoryId>,
) -> ApiResult<Vec<Assignment>> {
    Ok(Json(state.node.services.catalog.list_assignments(&ctx, &id).await?))
}

async fn add_deduction(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CategoryId>,
    Json(req): Json<DeductionRequest>,
) -> Created<OverallDeduction> {
    created(
        state
            .node
            .services
            .catalog
            .add_deduction(&ctx, &id, &req.contestant_id, req.amount, &req.reason)
            .await?,
    )
}

async fn create_judge(
    State(state): SharedState,
    Caller(ctx): Caller,
    Json(req): Json<JudgeRequest>,
) -> Created<Judge> {
    created(
        state
            .node
            .services
            .catalog
            .create_judge(&ctx, &req.name, req.user_id)
            .await?,
    )
}

async fn create_contestant(
    State(state): SharedState,
    Caller(ctx): Caller,
    Json(req): Json<ContestantRequest>,
) -> Created<Contestant> {
    created(
        state
            .node
            .services
            .catalog
            .create_contestant(&ctx, &req.name, req.contestant_number)
            .await?,
    )
}

// ---------- scores ----------

async fn submit_score(
    State(state): SharedState,
    Caller(ctx): Caller,
    Json(req): Json<ScoreSubmission>,
) -> ApiResult<Score> {
    Ok(Json(state.node.services.scores.submit_score(&ctx, req).await?))
}

async fn list_scores(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CategoryId>,
) -> ApiResult<Vec<Score>> {
    Ok(Json(
        state
            .node
            .services
            .scores
            .scores_for_category(&ctx, &id)
            .await?,
    ))
}

// ---------- aggregate workflow ----------

async fn list_certifications(
    State(state): SharedState,
    Caller(ctx): Caller,
) -> ApiResult<Vec<Certification>> {
    Ok(Json(state.node.services.workflow.list(&ctx).await?))
}

async fn create_certification(
    State(state): SharedState,
    Caller(ctx): Caller,
    Json(req): Json<NewCertification>,
) -> Created<Certification> {
    created(state.node.services.workflow.create(&ctx, req).await?)
}

async fn get_certification(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CertificationId>,
) -> ApiResult<Certification> {
    Ok(Json(state.node.services.workflow.get(&ctx, &id).await?))
}

async fn update_certification(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CertificationId>,
    Json(req): Json<CertificationUpdate>,
) -> ApiResult<Certification> {
    Ok(Json(state.node.services.workflow.update(&ctx, &id, req).await?))
}

async fn delete_certification(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CertificationId>,
) -> Result<StatusCode, ApiError> {
    state.node.services.workflow.delete(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn certify_judge(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CertificationId>,
) -> ApiResult<Certification> {
    Ok(Json(state.node.services.workflow.certify_judge(&ctx, &id).await?))
}

async fn certify_tally(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CertificationId>,
) -> ApiResult<Certification> {
    Ok(Json(state.node.services.workflow.certify_tally(&ctx, &id).await?))
}

async fn certify_auditor(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CertificationId>,
) -> ApiResult<Certification> {
    Ok(Json(state.node.services.workflow.certify_auditor(&ctx, &id).await?))
}

async fn approve_board(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CertificationId>,
) -> ApiResult<Certification> {
    Ok(Json(state.node.services.workflow.approve_board(&ctx, &id).await?))
}

async fn reject_certification(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CertificationId>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<Certification> {
    Ok(Json(
        state
            .node
            .services
            .workflow
            .reject(&ctx, &id, &req.reason)
            .await?,
    ))
}

// ---------- role ledger ----------

async fn certify_category(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CategoryId>,
    body: Option<Json<SignOff>>,
) -> Created<LedgerEntry> {
    let sign_off = body.map(|Json(s)| s).unwrap_or_default();
    created(
        state
            .node
            .services
            .ledger
            .certify_category(&ctx, &id, sign_off)
            .await?,
    )
}

async fn certify_contest(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<ContestId>,
    body: Option<Json<SignOff>>,
) -> Created<LedgerEntry> {
    let sign_off = body.map(|Json(s)| s).unwrap_or_default();
    created(
        state
            .node
            .services
            .ledger
            .certify_contest(&ctx, &id, sign_off)
            .await?,
    )
}

async fn category_progress(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CategoryId>,
) -> ApiResult<CategoryProgress> {
    Ok(Json(
        state
            .node
            .services
            .ledger
            .category_progress(&ctx, &id)
            .await?,
    ))
}

async fn final_certification(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CategoryId>,
    body: Option<Json<SignOff>>,
) -> Created<FinalCertification> {
    let sign_off = body.map(|Json(s)| s).unwrap_or_default();
    created(
        state
            .node
            .services
            .auditor
            .submit_final_certification(&ctx, &id, sign_off)
            .await?,
    )
}

async fn reset_category(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CategoryId>,
) -> ApiResult<ResetSummary> {
    Ok(Json(state.node.services.ledger.reset_category(&ctx, &id).await?))
}

async fn review_judge_totals(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path((category_id, judge_id)): Path<(CategoryId, JudgeId)>,
    body: Option<Json<SignOff>>,
) -> Created<LedgerEntry> {
    let sign_off = body.map(|Json(s)| s).unwrap_or_default();
    created(
        state
            .node
            .services
            .ledger
            .review_judge_totals(&ctx, &category_id, &judge_id, sign_off)
            .await?,
    )
}

async fn certify_judge_contestant(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path((category_id, judge_id, contestant_id)): Path<(CategoryId, JudgeId, ContestantId)>,
) -> Created<JudgeContestantCertification> {
    created(
        state
            .node
            .services
            .ledger
            .certify_judge_contestant(&ctx, &judge_id, &category_id, &contestant_id)
            .await?,
    )
}

// ---------- removal / uncertification ----------

async fn create_request(
    State(state): SharedState,
    Caller(ctx): Caller,
    Json(req): Json<NewRequest>,
) -> Created<SignOffRequest> {
    created(state.node.services.removal.create_request(&ctx, req).await?)
}

async fn list_requests(
    State(state): SharedState,
    Caller(ctx): Caller,
    Query(query): Query<RequestsQuery>,
) -> ApiResult<Vec<SignOffRequest>> {
    Ok(Json(state.node.services.removal.list(&ctx, query.status).await?))
}

async fn get_request(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<RequestId>,
) -> ApiResult<SignOffRequest> {
    Ok(Json(state.node.services.removal.get(&ctx, &id).await?))
}

async fn sign_request(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<RequestId>,
    Json(req): Json<SignRequest>,
) -> ApiResult<SignOffRequest> {
    Ok(Json(
        state
            .node
            .services
            .removal
            .sign_request(&ctx, &id, &req.signature_name)
            .await?,
    ))
}

async fn execute_request(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<RequestId>,
) -> ApiResult<ExecutionReport> {
    Ok(Json(state.node.services.removal.execute(&ctx, &id).await?))
}

// ---------- winners ----------

async fn category_winners(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<CategoryId>,
) -> ApiResult<CategoryWinners> {
    Ok(Json(
        state
            .node
            .services
            .winners
            .winners_by_category(&ctx, &id)
            .await?,
    ))
}

async fn contest_winners(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<ContestId>,
) -> ApiResult<ContestWinners> {
    Ok(Json(
        state
            .node
            .services
            .winners
            .winners_by_contest(&ctx, &id)
            .await?,
    ))
}

async fn event_winners(
    State(state): SharedState,
    Caller(ctx): Caller,
    Path(id): Path<EventId>,
) -> ApiResult<EventWinners> {
    Ok(Json(
        state
            .node
            .services
            .winners
            .winners_by_event(&ctx, &id)
            .await?,
    ))
}

use podium_certification::{
    CertificationServices, CertificationUpdate, NewCertification, ScoreSubmission,
    WorkflowConfig,
};
use podium_storage::{MemoryBackend, StorageBackend};
use podium_types::{
    AssignmentStatus, Category, Certification, CertificationStatus, Judge, LedgerScope,
    RequestContext, Role, TenantId, UserId,
};
use std::sync::Arc;

fn ctx(role: Role, user: &str) -> RequestContext {
    RequestContext::new(TenantId::new("tenant-a"), UserId::new(user), role)
}

struct Fixture {
    storage: Arc<MemoryBackend>,
    services: CertificationServices,
    category: Category,
    judge: Judge,
    cert: Certification,
}

async fn setup() -> Fixture {
    let storage = Arc::new(MemoryBackend::new());
    let services = CertificationServices::new(storage.clone(), WorkflowConfig::default());
    let admin = ctx(Role::Admin, "admin");
    let catalog = &services.catalog;

    let event = catalog.create_event(&admin, "Regional Finals").await.unwrap();
    let contest = catalog.create_contest(&admin, &event.id, "Piano").await.unwrap();
    let category = catalog.create_category(&admin, &contest.id, "Senior").await.unwrap();
    let criterion = catalog
        .add_criterion(&admin, &category.id, "Technique", 50.0)
        .await
        .unwrap();
    let contestant = catalog.create_contestant(&admin, "Clara", Some(1)).await.unwrap();
    let category = catalog
        .enroll_contestant(&admin, &category.id, &contestant.id)
        .await
        .unwrap();
    let judge = catalog
        .create_judge(&admin, "Judge Ames", Some(UserId::new("judge-1")))
        .await
        .unwrap();
    catalog
        .assign_judge(&admin, &judge.id, &category.id, AssignmentStatus::Active)
        .await
        .unwrap();

    services
        .scores
        .submit_score(
            &ctx(Role::Judge, "judge-1"),
            ScoreSubmission {
                judge_id: judge.id.clone(),
                category_id: category.id.clone(),
                contestant_id: contestant.id.clone(),
                criterion_id: Some(criterion.id.clone()),
                value: 42.0,
                comment: None,
            },
        )
        .await
        .unwrap();

    let cert = services
        .workflow
        .create(
            &admin,
            NewCertification {
                event_id: event.id,
                contest_id: contest.id,
                category_id: category.id.clone(),
                notes: Some("first round".into()),
            },
        )
        .await
        .unwrap();

    Fixture {
        storage,
        services,
        category,
        judge,
        cert,
    }
}

#[tokio::test]
async fn test_full_pipeline_reaches_certified() {
    let f = setup().await;
    let wf = &f.services.workflow;
    let id = &f.cert.id;

    let cert = wf.certify_judge(&ctx(Role::Judge, "judge-1"), id).await.unwrap();
    assert_eq!(cert.status, CertificationStatus::InProgress);
    assert_eq!(cert.current_step, 2);
    assert!(cert.gates_are_ordered());

    let cert = wf.certify_tally(&ctx(Role::TallyMaster, "tally"), id).await.unwrap();
    assert_eq!(cert.current_step, 3);
    let cert = wf.certify_auditor(&ctx(Role::Auditor, "auditor"), id).await.unwrap();
    assert_eq!(cert.current_step, 4);
    assert_eq!(cert.status, CertificationStatus::InProgress);

    let cert = wf.approve_board(&ctx(Role::Board, "board"), id).await.unwrap();
    assert_eq!(cert.status, CertificationStatus::Certified);
    assert_eq!(cert.certified_by, Some(UserId::new("board")));
    assert!(cert.certified_at.is_some());
    assert!(cert.gates_are_ordered());

    // Every score of the category is certified and locked
    let scores = f.storage.list_scores(&f.category.id).await.unwrap();
    assert!(scores.iter().all(|s| s.is_certified && s.is_locked));

    // The gates left their marks in the role ledger
    let entries = f
        .storage
        .list_ledger_entries(&LedgerScope::Category(f.category.id.clone()))
        .await
        .unwrap();
    let roles: Vec<Role> = entries.iter().map(|e| e.role).collect();
    assert_eq!(roles, vec![Role::TallyMaster, Role::Auditor, Role::Board]);
}

#[tokio::test]
async fn test_tally_before_judge_fails_and_leaves_state() {
    let f = setup().await;
    let wf = &f.services.workflow;
    let before = wf.get(&ctx(Role::Admin, "admin"), &f.cert.id).await.unwrap();

    let err = wf
        .certify_tally(&ctx(Role::TallyMaster, "tally"), &f.cert.id)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Judge must certify first");
    assert_eq!(err.status_code(), 400);

    let after = wf.get(&ctx(Role::Admin, "admin"), &f.cert.id).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_certify_judge_twice_is_refused() {
    let f = setup().await;
    let wf = &f.services.workflow;
    let judge = ctx(Role::Judge, "judge-1");

    let first = wf.certify_judge(&judge, &f.cert.id).await.unwrap();
    let err = wf.certify_judge(&judge, &f.cert.id).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(err.to_string(), "Judge certification already completed");

    let stored = wf.get(&judge, &f.cert.id).await.unwrap();
    assert_eq!(stored.version, first.version);
}

#[tokio::test]
async fn test_concurrent_judge_certification_passes_once() {
    let f = setup().await;
    let wf = f.services.workflow.clone();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let wf = wf.clone();
        let id = f.cert.id.clone();
        handles.push(tokio::spawn(async move {
            wf.certify_judge(&ctx(Role::Admin, "admin"), &id).await
        }));
    }

    let mut passed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            passed += 1;
        }
    }
    assert_eq!(passed, 1);
}

#[tokio::test]
async fn test_finalized_certification_cannot_be_rejected_or_deleted() {
    let f = setup().await;
    let wf = &f.services.workflow;
    let admin = ctx(Role::Admin, "admin");
    wf.certify_judge(&admin, &f.cert.id).await.unwrap();
    wf.certify_tally(&admin, &f.cert.id).await.unwrap();
    wf.certify_auditor(&admin, &f.cert.id).await.unwrap();
    wf.approve_board(&admin, &f.cert.id).await.unwrap();

    let err = wf.reject(&admin, &f.cert.id, "recount").await.unwrap_err();
    assert_eq!(err.to_string(), "Cannot reject a finalized certification");

    let err = wf.delete(&admin, &f.cert.id).await.unwrap_err();
    assert_eq!(err.status_code(), 400);

    let stored = wf.get(&admin, &f.cert.id).await.unwrap();
    assert_eq!(stored.status, CertificationStatus::Certified);
}

#[tokio::test]
async fn test_rejection_is_terminal_and_needs_a_reason() {
    let f = setup().await;
    let wf = &f.services.workflow;
    let board = ctx(Role::Board, "board");

    let err = wf.reject(&board, &f.cert.id, "   ").await.unwrap_err();
    assert_eq!(err.status_code(), 400);

    let cert = wf.reject(&board, &f.cert.id, "  scoring sheet missing ").await.unwrap();
    assert_eq!(cert.status, CertificationStatus::Rejected);
    assert_eq!(cert.rejection_reason.as_deref(), Some("scoring sheet missing"));

    let err = wf
        .certify_judge(&ctx(Role::Judge, "judge-1"), &f.cert.id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_roles_are_enforced_per_gate() {
    let f = setup().await;
    let wf = &f.services.workflow;
    wf.certify_judge(&ctx(Role::Judge, "judge-1"), &f.cert.id)
        .await
        .unwrap();

    let err = wf
        .certify_tally(&ctx(Role::Judge, "judge-1"), &f.cert.id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    let err = wf
        .reject(&ctx(Role::Judge, "judge-1"), &f.cert.id, "nope")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn test_duplicate_row_and_metadata_update() {
    let f = setup().await;
    let wf = &f.services.workflow;
    let admin = ctx(Role::Admin, "admin");

    let err = wf
        .create(
            &admin,
            NewCertification {
                event_id: f.cert.event_id.clone(),
                contest_id: f.cert.contest_id.clone(),
                category_id: f.category.id.clone(),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);

    let updated = wf
        .update(
            &admin,
            &f.cert.id,
            CertificationUpdate {
                notes: Some("moved to hall B".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.notes.as_deref(), Some("moved to hall B"));
    assert!(!updated.judge_certified);
    assert_eq!(wf.list(&admin).await.unwrap().len(), 1);

    wf.delete(&admin, &f.cert.id).await.unwrap();
    assert_eq!(wf.get(&admin, &f.cert.id).await.unwrap_err().status_code(), 404);
}

#[tokio::test]
async fn test_other_tenant_sees_nothing() {
    let f = setup().await;
    let wf = &f.services.workflow;
    let outsider =
        RequestContext::new(TenantId::new("tenant-b"), UserId::new("admin"), Role::Admin);

    assert_eq!(wf.get(&outsider, &f.cert.id).await.unwrap_err().status_code(), 404);
    assert_eq!(
        wf.certify_judge(&outsider, &f.cert.id).await.unwrap_err().status_code(),
        404
    );
    assert!(wf.list(&outsider).await.unwrap().is_empty());
    assert_eq!(f.judge.tenant_id, TenantId::new("tenant-a"));
}

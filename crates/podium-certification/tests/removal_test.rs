use podium_certification::{
    CertificationServices, NewRequest, RemovalWorkflow, ScoreSubmission, WorkflowConfig,
};
use podium_storage::{MemoryBackend, StorageBackend};
use podium_types::{
    AssignmentStatus, CategoryId, Judge, RequestContext, RequestKind, RequestStatus, Role,
    SignOffRequest, TenantId, UserId,
};
use std::sync::Arc;

fn ctx(role: Role, user: &str) -> RequestContext {
    RequestContext::new(TenantId::new("tenant-a"), UserId::new(user), role)
}

struct Fixture {
    storage: Arc<MemoryBackend>,
    services: CertificationServices,
    category_id: CategoryId,
    other_category_id: CategoryId,
    judges: Vec<Judge>,
}

/// Two judges score two contestants in two categories
async fn setup() -> Fixture {
    let storage = Arc::new(MemoryBackend::new());
    let services = CertificationServices::new(storage.clone(), WorkflowConfig::default());
    let admin = ctx(Role::Admin, "admin");
    let catalog = &services.catalog;

    let event = catalog.create_event(&admin, "State Fair").await.unwrap();
    let contest = catalog.create_contest(&admin, &event.id, "Baking").await.unwrap();
    let judges = vec![
        catalog
            .create_judge(&admin, "Judge One", Some(UserId::new("judge-1")))
            .await
            .unwrap(),
        catalog
            .create_judge(&admin, "Judge Two", Some(UserId::new("judge-2")))
            .await
            .unwrap(),
    ];
    let contestants = vec![
        catalog.create_contestant(&admin, "Ivy", Some(1)).await.unwrap(),
        catalog.create_contestant(&admin, "Oren", Some(2)).await.unwrap(),
    ];

    let mut categories = Vec::new();
    for name in ["Pies", "Breads"] {
        let category = catalog.create_category(&admin, &contest.id, name).await.unwrap();
        let criterion = catalog
            .add_criterion(&admin, &category.id, "Taste", 10.0)
            .await
            .unwrap();
        for contestant in &contestants {
            catalog
                .enroll_contestant(&admin, &category.id, &contestant.id)
                .await
                .unwrap();
        }
        for (i, judge) in judges.iter().enumerate() {
            catalog
                .assign_judge(&admin, &judge.id, &category.id, AssignmentStatus::Active)
                .await
                .unwrap();
            for contestant in &contestants {
                services
                    .scores
                    .submit_score(
                        &ctx(Role::Judge, &format!("judge-{}", i + 1)),
                        ScoreSubmission {
                            judge_id: judge.id.clone(),
                            category_id: category.id.clone(),
                            contestant_id: contestant.id.clone(),
                            criterion_id: Some(criterion.id.clone()),
                            value: 6.0,
                            comment: None,
                        },
                    )
                    .await
                    .unwrap();
            }
        }
        categories.push(category);
    }

    Fixture {
        storage,
        services,
        category_id: categories[0].id.clone(),
        other_category_id: categories[1].id.clone(),
        judges,
    }
}

async fn request(f: &Fixture, kind: RequestKind) -> SignOffRequest {
    f.services
        .removal
        .create_request(
            &ctx(Role::Board, "board-chair"),
            NewRequest {
                kind,
                category_id: f.category_id.clone(),
                judge_id: f.judges[0].id.clone(),
                contestant_id: None,
                reason: "  judge had a conflict of interest ".into(),
            },
        )
        .await
        .unwrap()
}

async fn sign_all(removal: &RemovalWorkflow, request: &SignOffRequest) -> SignOffRequest {
    let mut last = request.clone();
    for (role, user) in [
        (Role::Auditor, "auditor"),
        (Role::TallyMaster, "tally"),
        (Role::Board, "board"),
    ] {
        last = removal
            .sign_request(&ctx(role, user), &request.id, user)
            .await
            .unwrap();
    }
    last
}

#[tokio::test]
async fn test_create_request_validation() {
    let f = setup().await;
    let removal = &f.services.removal;
    let input = |reason: &str| NewRequest {
        kind: RequestKind::ScoreRemoval,
        category_id: f.category_id.clone(),
        judge_id: f.judges[0].id.clone(),
        contestant_id: None,
        reason: reason.into(),
    };

    let err = removal
        .create_request(&ctx(Role::Auditor, "auditor"), input("reason"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    let err = removal
        .create_request(&ctx(Role::Board, "board"), input("   "))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let mut missing = input("reason");
    missing.category_id = CategoryId::new("cat_missing");
    let err = removal
        .create_request(&ctx(Role::Admin, "admin"), missing)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);

    let created = request(&f, RequestKind::ScoreRemoval).await;
    assert_eq!(created.reason, "judge had a conflict of interest");
    assert_eq!(created.status, RequestStatus::Pending);
    assert_eq!(created.signature_count(), 0);
}

#[tokio::test]
async fn test_approval_needs_all_three_signatures() {
    let f = setup().await;
    let removal = &f.services.removal;
    let created = request(&f, RequestKind::ScoreRemoval).await;

    let after_one = removal
        .sign_request(&ctx(Role::Auditor, "auditor"), &created.id, "Ann Auditor")
        .await
        .unwrap();
    assert_eq!(after_one.status, RequestStatus::Pending);

    let after_two = removal
        .sign_request(&ctx(Role::Board, "board"), &created.id, "Bo Board")
        .await
        .unwrap();
    assert_eq!(after_two.status, RequestStatus::Pending);
    assert_eq!(after_two.missing_roles(), vec![Role::TallyMaster]);

    let approved = removal
        .sign_request(&ctx(Role::TallyMaster, "tally"), &created.id, "Tia Tally")
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert!(approved.all_signed());
    assert!(approved.approved_at.is_some());

    // Approved requests take no more signatures and never regress
    let err = removal
        .sign_request(&ctx(Role::Board, "board-2"), &created.id, "Late Signer")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    let stored = removal.get(&ctx(Role::Admin, "admin"), &created.id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Approved);
}

#[tokio::test]
async fn test_one_signature_per_role() {
    let f = setup().await;
    let removal = &f.services.removal;
    let created = request(&f, RequestKind::ScoreRemoval).await;

    removal
        .sign_request(&ctx(Role::Auditor, "auditor-1"), &created.id, "First")
        .await
        .unwrap();
    let err = removal
        .sign_request(&ctx(Role::Auditor, "auditor-2"), &created.id, "Second")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
    assert!(err.to_string().contains("already signed"));
    assert!(err.to_string().contains("your signature is not required"));

    let err = removal
        .sign_request(&ctx(Role::Judge, "judge-1"), &created.id, "Judge")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    let err = removal
        .sign_request(&ctx(Role::Board, "board"), &created.id, "  ")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_concurrent_same_role_signatures_write_once() {
    let f = setup().await;
    let created = request(&f, RequestKind::ScoreRemoval).await;
    let removal = f.services.removal.clone();

    let mut handles = Vec::new();
    for i in 0..12 {
        let removal = removal.clone();
        let id = created.id.clone();
        handles.push(tokio::spawn(async move {
            let user = format!("board-{i}");
            removal
                .sign_request(&ctx(Role::Board, &user), &id, &user)
                .await
        }));
    }

    let mut signed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            signed += 1;
        }
    }
    assert_eq!(signed, 1);

    let stored = removal.get(&ctx(Role::Admin, "admin"), &created.id).await.unwrap();
    assert_eq!(stored.signature_count(), 1);
}

#[tokio::test]
async fn test_execute_requires_approval() {
    let f = setup().await;
    let removal = &f.services.removal;
    let created = request(&f, RequestKind::ScoreRemoval).await;
    removal
        .sign_request(&ctx(Role::Auditor, "auditor"), &created.id, "auditor")
        .await
        .unwrap();

    let err = removal
        .execute(&ctx(Role::Board, "board"), &created.id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(f.storage.list_scores(&f.category_id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_removal_deletes_exactly_the_judge_scores() {
    let f = setup().await;
    let removal = &f.services.removal;
    let created = request(&f, RequestKind::ScoreRemoval).await;
    sign_all(removal, &created).await;

    let report = removal
        .execute(&ctx(Role::Board, "board"), &created.id)
        .await
        .unwrap();
    assert_eq!(report.scores_affected, 2);
    assert_eq!(report.request.status, RequestStatus::Completed);
    assert!(report.request.completed_at.is_some());

    let remaining = f.storage.list_scores(&f.category_id).await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|s| s.judge_id == f.judges[1].id));
    // Same judge, other category: untouched
    assert_eq!(f.storage.list_scores(&f.other_category_id).await.unwrap().len(), 4);

    let err = removal
        .execute(&ctx(Role::Board, "board"), &created.id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_uncertification_unlocks_judge_scores() {
    let f = setup().await;
    let admin = ctx(Role::Admin, "admin");
    f.services
        .scores
        .certify_category_scores(&admin, &f.category_id, true)
        .await
        .unwrap();

    let removal = &f.services.removal;
    let created = request(&f, RequestKind::JudgeUncertification).await;
    let approved = sign_all(removal, &created).await;
    assert_eq!(approved.status, RequestStatus::Approved);

    let report = removal.execute(&admin, &created.id).await.unwrap();
    assert_eq!(report.scores_affected, 2);
    assert_eq!(report.request.status, RequestStatus::Completed);

    let scores = f.storage.list_scores(&f.category_id).await.unwrap();
    assert_eq!(scores.len(), 4);
    for score in scores {
        if score.judge_id == f.judges[0].id {
            assert!(!score.is_certified && !score.is_locked);
        } else {
            assert!(score.is_certified && score.is_locked);
        }
    }

    let completed = removal
        .list(&admin, Some(RequestStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert!(removal
        .list(&admin, Some(RequestStatus::Pending))
        .await
        .unwrap()
        .is_empty());
}

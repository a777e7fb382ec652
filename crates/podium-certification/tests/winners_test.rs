use podium_certification::{CertificationServices, ScoreSubmission, SignOff, WorkflowConfig};
use podium_storage::MemoryBackend;
use podium_types::{
    AssignmentStatus, Category, Contest, Contestant, Event, Judge, RequestContext, Role,
    TenantId, UserId,
};
use std::sync::Arc;

fn ctx(role: Role, user: &str) -> RequestContext {
    RequestContext::new(TenantId::new("tenant-a"), UserId::new(user), role)
}

struct Fixture {
    services: CertificationServices,
    event: Event,
    contest: Contest,
    categories: Vec<Category>,
    judge: Judge,
    contestants: Vec<Contestant>,
}

/// Two categories without criteria, one judge, contestants A (#1) and B (#2)
async fn setup() -> Fixture {
    let services =
        CertificationServices::new(Arc::new(MemoryBackend::new()), WorkflowConfig::default());
    let admin = ctx(Role::Admin, "admin");
    let catalog = &services.catalog;

    let event = catalog.create_event(&admin, "Festival").await.unwrap();
    let contest = catalog.create_contest(&admin, &event.id, "Choir").await.unwrap();
    let judge = catalog
        .create_judge(&admin, "Judge Lee", Some(UserId::new("judge-lee")))
        .await
        .unwrap();
    let contestants = vec![
        catalog.create_contestant(&admin, "contestantA", Some(1)).await.unwrap(),
        catalog.create_contestant(&admin, "contestantB", Some(2)).await.unwrap(),
    ];

    let mut categories = Vec::new();
    for name in ["Classical", "Folk"] {
        let category = catalog.create_category(&admin, &contest.id, name).await.unwrap();
        for contestant in &contestants {
            catalog
                .enroll_contestant(&admin, &category.id, &contestant.id)
                .await
                .unwrap();
        }
        catalog
            .assign_judge(&admin, &judge.id, &category.id, AssignmentStatus::Active)
            .await
            .unwrap();
        categories.push(
            catalog.get_category(&admin, &category.id).await.unwrap(),
        );
    }

    Fixture {
        services,
        event,
        contest,
        categories,
        judge,
        contestants,
    }
}

impl Fixture {
    /// Category-level score (no criterion) from the judge
    async fn score(&self, category: usize, contestant: usize, value: f64) {
        self.services
            .scores
            .submit_score(
                &ctx(Role::Judge, "judge-lee"),
                ScoreSubmission {
                    judge_id: self.judge.id.clone(),
                    category_id: self.categories[category].id.clone(),
                    contestant_id: self.contestants[contestant].id.clone(),
                    criterion_id: None,
                    value,
                    comment: None,
                },
            )
            .await
            .unwrap();
    }

    /// Drive a category through judge, tally, auditor and board records
    async fn certify_through_board(&self, category: usize) {
        let category = &self.categories[category];
        for contestant in &self.contestants {
            self.services
                .ledger
                .certify_judge_contestant(
                    &ctx(Role::Judge, "judge-lee"),
                    &self.judge.id,
                    &category.id,
                    &contestant.id,
                )
                .await
                .unwrap();
        }
        self.services
            .ledger
            .review_judge_totals(
                &ctx(Role::TallyMaster, "tally"),
                &category.id,
                &self.judge.id,
                SignOff::default(),
            )
            .await
            .unwrap();
        self.services
            .auditor
            .submit_final_certification(
                &ctx(Role::Auditor, "auditor"),
                &category.id,
                SignOff::default(),
            )
            .await
            .unwrap();
        self.services
            .ledger
            .certify_category(&ctx(Role::Board, "board"), &category.id, SignOff::default())
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_category_totals_rank_highest_first() {
    let f = setup().await;
    // Upserts key on (judge, category, contestant, criterion), so spread
    // contestantA's two scores over two criteria
    let admin = ctx(Role::Admin, "admin");
    let category = &f.categories[0];
    let first = f
        .services
        .catalog
        .add_criterion(&admin, &category.id, "Tone", 20.0)
        .await
        .unwrap();
    let second = f
        .services
        .catalog
        .add_criterion(&admin, &category.id, "Diction", 20.0)
        .await
        .unwrap();

    let sheet = [(0, &first, 10.0), (0, &second, 20.0), (1, &first, 5.0)];
    for (contestant, criterion, value) in sheet {
        f.services
            .scores
            .submit_score(
                &ctx(Role::Judge, "judge-lee"),
                ScoreSubmission {
                    judge_id: f.judge.id.clone(),
                    category_id: category.id.clone(),
                    contestant_id: f.contestants[contestant].id.clone(),
                    criterion_id: Some(criterion.id.clone()),
                    value,
                    comment: None,
                },
            )
            .await
            .unwrap();
    }

    let winners = f
        .services
        .winners
        .winners_by_category(&admin, &category.id)
        .await
        .unwrap();
    assert!(winners.can_show_winners);
    assert_eq!(winners.total_possible_score, Some(40.0));
    assert_eq!(winners.results.len(), 2);
    assert_eq!(winners.results[0].name, "contestantA");
    assert_eq!(winners.results[0].total_score, 30.0);
    assert_eq!(winners.results[0].rank, 1);
    assert_eq!(winners.results[1].name, "contestantB");
    assert_eq!(winners.results[1].total_score, 5.0);
    assert_eq!(winners.results[1].rank, 2);
}

#[tokio::test]
async fn test_deductions_are_subtracted_and_floored() {
    let f = setup().await;
    let admin = ctx(Role::Admin, "admin");
    let category = &f.categories[0];
    f.score(0, 0, 12.0).await;
    f.score(0, 1, 4.0).await;

    let catalog = &f.services.catalog;
    catalog
        .add_deduction(&admin, &category.id, &f.contestants[0].id, 3.0, "overtime")
        .await
        .unwrap();
    catalog
        .add_deduction(&admin, &category.id, &f.contestants[1].id, 10.0, "dress code")
        .await
        .unwrap();

    let winners = f
        .services
        .winners
        .winners_by_category(&admin, &category.id)
        .await
        .unwrap();
    assert_eq!(winners.total_possible_score, None);
    assert_eq!(winners.results[0].raw_score, 12.0);
    assert_eq!(winners.results[0].deductions, 3.0);
    assert_eq!(winners.results[0].total_score, 9.0);
    assert_eq!(winners.results[1].total_score, 0.0);
}

#[tokio::test]
async fn test_ties_break_on_contestant_number() {
    let f = setup().await;
    f.score(0, 1, 8.0).await;
    f.score(0, 0, 8.0).await;

    let winners = f
        .services
        .winners
        .winners_by_category(&ctx(Role::Board, "board"), &f.categories[0].id)
        .await
        .unwrap();
    assert_eq!(winners.results[0].contestant_number, Some(1));
    assert_eq!(winners.results[1].contestant_number, Some(2));
}

#[tokio::test]
async fn test_results_hidden_until_board_certifies() {
    let f = setup().await;
    f.score(0, 0, 9.0).await;
    f.score(0, 1, 7.0).await;
    let emcee = ctx(Role::Emcee, "emcee");

    let hidden = f
        .services
        .winners
        .winners_by_category(&emcee, &f.categories[0].id)
        .await
        .unwrap();
    assert!(!hidden.can_show_winners);
    assert!(!hidden.board_certified);
    assert!(hidden.results.is_empty());
    assert!(hidden.message.is_some());

    f.certify_through_board(0).await;

    let shown = f
        .services
        .winners
        .winners_by_category(&emcee, &f.categories[0].id)
        .await
        .unwrap();
    assert!(shown.can_show_winners);
    assert!(shown.board_certified);
    assert_eq!(shown.results.len(), 2);
    assert!(shown.message.is_none());
}

#[tokio::test]
async fn test_contest_and_event_aggregation() {
    let f = setup().await;
    f.score(0, 0, 9.0).await;
    f.score(0, 1, 7.0).await;
    f.score(1, 0, 2.0).await;
    f.score(1, 1, 6.0).await;
    f.certify_through_board(0).await;

    // Only the board-certified category is disclosed to an emcee
    let emcee = ctx(Role::Emcee, "emcee");
    let contest = f
        .services
        .winners
        .winners_by_contest(&emcee, &f.contest.id)
        .await
        .unwrap();
    assert_eq!(contest.categories.len(), 1);
    assert_eq!(contest.withheld_categories, vec![f.categories[1].id.clone()]);
    assert_eq!(contest.results[0].name, "contestantA");
    assert_eq!(contest.results[0].total_score, 9.0);

    // Privileged callers see every category summed
    let admin = ctx(Role::Admin, "admin");
    let contest = f
        .services
        .winners
        .winners_by_contest(&admin, &f.contest.id)
        .await
        .unwrap();
    assert!(contest.withheld_categories.is_empty());
    assert_eq!(contest.results[0].name, "contestantB");
    assert_eq!(contest.results[0].total_score, 13.0);
    assert_eq!(contest.results[1].total_score, 11.0);

    let event = f
        .services
        .winners
        .winners_by_event(&admin, &f.event.id)
        .await
        .unwrap();
    assert_eq!(event.contests.len(), 1);
    assert_eq!(event.contests[0], contest);

    let outsider = RequestContext::new(TenantId::new("tenant-b"), UserId::new("x"), Role::Admin);
    let err = f
        .services
        .winners
        .winners_by_event(&outsider, &f.event.id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

//! In-memory walkthrough of a complete category: scoring, the role chain
//! and winner disclosure.

use anyhow::Result;
use podium_certification::{
    CategoryWinners, CertificationServices, NewCertification, ScoreSubmission, SignOff,
    WorkflowConfig,
};
use podium_storage::MemoryBackend;
use podium_types::{AssignmentStatus, RequestContext, Role, TenantId, UserId};
use std::sync::Arc;
use tracing::info;

const TENANT: &str = "demo";

fn as_role(role: Role, user: &str) -> RequestContext {
    RequestContext::new(TenantId::new(TENANT), UserId::new(user), role)
}

fn signed(name: &str) -> SignOff {
    SignOff {
        signature_name: Some(name.to_string()),
        comments: None,
    }
}

/// Run one category from setup to board approval and return what the
/// emcee would see afterwards
pub async fn run_demo() -> Result<CategoryWinners> {
    let services =
        CertificationServices::new(Arc::new(MemoryBackend::new()), WorkflowConfig::default());
    let admin = as_role(Role::Admin, "admin");
    let catalog = &services.catalog;

    let event = catalog.create_event(&admin, "Spring Showcase").await?;
    let contest = catalog
        .create_contest(&admin, &event.id, "Vocal Solo")
        .await?;
    let category = catalog
        .create_category(&admin, &contest.id, "Senior Division")
        .await?;
    let criteria = vec![
        catalog
            .add_criterion(&admin, &category.id, "Technique", 10.0)
            .await?,
        catalog
            .add_criterion(&admin, &category.id, "Artistry", 10.0)
            .await?,
    ];

    let contestants = vec![
        catalog
            .create_contestant(&admin, "Avery Quinn", Some(1))
            .await?,
        catalog
            .create_contestant(&admin, "Rowan Blake", Some(2))
            .await?,
        catalog
            .create_contestant(&admin, "Sasha Moreno", Some(3))
            .await?,
    ];
    for contestant in &contestants {
        catalog
            .enroll_contestant(&admin, &category.id, &contestant.id)
            .await?;
    }

    let mut judges = Vec::new();
    for (name, user) in [("Judge Park", "judge-park"), ("Judge Ellis", "judge-ellis")] {
        let judge = catalog
            .create_judge(&admin, name, Some(UserId::new(user)))
            .await?;
        catalog
            .assign_judge(&admin, &judge.id, &category.id, AssignmentStatus::Active)
            .await?;
        judges.push((judge, as_role(Role::Judge, user)));
    }

    let sheet: [[f64; 2]; 3] = [[8.5, 9.0], [9.5, 9.0], [7.0, 8.0]];
    for (offset, (judge, judge_ctx)) in judges.iter().enumerate() {
        for (contestant, marks) in contestants.iter().zip(sheet.iter()) {
            for (criterion, value) in criteria.iter().zip(marks.iter()) {
                services
                    .scores
                    .submit_score(
                        judge_ctx,
                        ScoreSubmission {
                            judge_id: judge.id.clone(),
                            category_id: category.id.clone(),
                            contestant_id: contestant.id.clone(),
                            criterion_id: Some(criterion.id.clone()),
                            value: value - offset as f64 * 0.5,
                            comment: None,
                        },
                    )
                    .await?;
            }
            services
                .ledger
                .certify_judge_contestant(judge_ctx, &judge.id, &category.id, &contestant.id)
                .await?;
        }
    }
    info!(category = %category.name, "Scores submitted and certified by judges");

    let certification = services
        .workflow
        .create(
            &admin,
            NewCertification {
                event_id: event.id.clone(),
                contest_id: contest.id.clone(),
                category_id: category.id.clone(),
                notes: None,
            },
        )
        .await?;
    services
        .workflow
        .certify_judge(&judges[0].1, &certification.id)
        .await?;

    let tally = as_role(Role::TallyMaster, "tally");
    for (judge, _) in &judges {
        services
            .ledger
            .review_judge_totals(&tally, &category.id, &judge.id, signed("Tally Master"))
            .await?;
    }
    services
        .workflow
        .certify_tally(&tally, &certification.id)
        .await?;

    let auditor = as_role(Role::Auditor, "auditor");
    let final_cert = services
        .auditor
        .submit_final_certification(&auditor, &category.id, signed("Auditor"))
        .await?;
    info!(
        scores_locked = final_cert.scores_locked,
        workflow_advanced = final_cert.workflow_advanced,
        "Auditor final certification recorded"
    );

    let board = as_role(Role::Board, "board");
    let approved = services
        .workflow
        .approve_board(&board, &certification.id)
        .await?;
    info!(status = ?approved.status, "Board approved category");

    let emcee = as_role(Role::Emcee, "emcee");
    Ok(services
        .winners
        .winners_by_category(&emcee, &category.id)
        .await?)
}

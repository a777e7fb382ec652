//! Certification core of the podium scoring platform.
//!
//! - **catalog**: minimal CRUD over the scored hierarchy
//! - **scores**: judge score submission and bulk certification
//! - **ledger**: role certification records and judge completion markers
//! - **auditor**: category-level final certification
//! - **workflow**: the four-gate aggregate certification row
//! - **removal**: three-signature removal / uncertification requests
//! - **winners**: results aggregation with disclosure gating
//!
//! Every operation takes the caller's [`podium_types::RequestContext`]; records of
//! another tenant are indistinguishable from missing ones.

mod access;
pub mod auditor;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod removal;
pub mod scores;
pub mod winners;
pub mod workflow;

pub use auditor::{AuditorCertificationService, FinalCertification};
pub use catalog::CatalogService;
pub use config::WorkflowConfig;
pub use error::{CertificationError, ErrorKind, Result};
pub use ledger::{CategoryProgress, CertificationLedger, SignOff};
pub use removal::{ExecutionReport, NewRequest, RemovalWorkflow};
pub use scores::{ScoreStore, ScoreSubmission};
pub use winners::{CategoryWinners, ContestWinners, ContestantResult, EventWinners, WinnerService};
pub use workflow::{CertificationUpdate, CertificationWorkflow, NewCertification};

use podium_storage::StorageBackend;
use std::sync::Arc;

/// All certification services over one shared backend
#[derive(Clone)]
pub struct CertificationServices {
    pub catalog: Arc<CatalogService>,
    pub scores: Arc<ScoreStore>,
    pub ledger: Arc<CertificationLedger>,
    pub auditor: Arc<AuditorCertificationService>,
    pub workflow: Arc<CertificationWorkflow>,
    pub removal: Arc<RemovalWorkflow>,
    pub winners: Arc<WinnerService>,
}

impl CertificationServices {
    pub fn new(storage: Arc<dyn StorageBackend>, config: WorkflowConfig) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(storage.clone())),
            scores: Arc::new(ScoreStore::new(storage.clone(), config.clone())),
            ledger: Arc::new(CertificationLedger::new(storage.clone())),
            auditor: Arc::new(AuditorCertificationService::new(storage.clone())),
            workflow: Arc::new(CertificationWorkflow::new(storage.clone(), config.clone())),
            removal: Arc::new(RemovalWorkflow::new(storage.clone(), config)),
            winners: Arc::new(WinnerService::new(storage)),
        }
    }
}

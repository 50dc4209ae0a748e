mod artifact_repository;
mod connection;
mod event_repository;
mod finding_repository;
mod proposal_repository;
mod repo_repository;
mod run_repository;

pub use artifact_repository::ArtifactRepository;
pub use connection::establish_connection;
pub use event_repository::EventRepository;
pub use finding_repository::FindingRepository;
pub use proposal_repository::ProposalRepository;
pub use repo_repository::RepoRepository;
pub use run_repository::{RunCounter, RunRepository};

pub type DbPool = sqlx::SqlitePool;

/// Bundle of all repositories over one pool; cloned freely into services
/// and spawned run drivers.
#[derive(Clone)]
pub struct Store {
    pub repos: RepoRepository,
    pub runs: RunRepository,
    pub events: EventRepository,
    pub findings: FindingRepository,
    pub proposals: ProposalRepository,
    pub artifacts: ArtifactRepository,
}

impl Store {
    pub fn new(pool: DbPool) -> Self {
        Self {
            repos: RepoRepository::new(pool.clone()),
            runs: RunRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            findings: FindingRepository::new(pool.clone()),
            proposals: ProposalRepository::new(pool.clone()),
            artifacts: ArtifactRepository::new(pool),
        }
    }
}

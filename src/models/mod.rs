pub mod artifact;
pub mod candidate;
pub mod event;
pub mod opportunity;
pub mod proposal;
pub mod repo;
pub mod run;

pub use artifact::{Artifact, ArtifactDraft, ArtifactType};
pub use candidate::{BenchMetrics, Candidate, ValidationResult, Verdict};
pub use event::{Event, EventKind};
pub use opportunity::{Opportunity, PatternKind, Span};
pub use proposal::{Proposal, ProposalStatus};
pub use repo::RepoProfile;
pub use run::{Run, RunStatus};

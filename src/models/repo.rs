use serde::{Deserialize, Serialize};

/// Connected repository profile. The engine treats this as immutable for
/// the duration of a run; connection flows live outside the core.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RepoProfile {
    pub id: String,
    pub name: String,
    pub default_branch: String,
    pub package_manager: String,
    /// Local path of the working tree the checkout provider snapshots.
    pub source_root: String,
    pub build_cmd: String,
    pub test_cmd: String,
    pub bench_cmd: Option<String>,
    pub created_at: i64,
}

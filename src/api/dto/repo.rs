use super::rfc3339;
use crate::models::RepoProfile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RegisterRepoRequest {
    pub id: String,
    pub name: String,
    pub default_branch: Option<String>,
    pub package_manager: Option<String>,
    pub source_root: String,
    pub build_cmd: String,
    pub test_cmd: String,
    pub bench_cmd: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RepoResponse {
    pub id: String,
    pub name: String,
    pub default_branch: String,
    pub package_manager: String,
    pub source_root: String,
    pub build_cmd: String,
    pub test_cmd: String,
    pub bench_cmd: Option<String>,
    pub created_at: String,
}

impl From<RepoProfile> for RepoResponse {
    fn from(repo: RepoProfile) -> Self {
        Self {
            id: repo.id,
            name: repo.name,
            default_branch: repo.default_branch,
            package_manager: repo.package_manager,
            source_root: repo.source_root,
            build_cmd: repo.build_cmd,
            test_cmd: repo.test_cmd,
            bench_cmd: repo.bench_cmd,
            created_at: rfc3339(repo.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReposListResponse {
    pub data: Vec<RepoResponse>,
}

use crate::error::{AppError, Result};
use crate::models::RepoProfile;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A checked-out copy of the repository, immutable for the duration of a
/// run. The backing directory is removed when the snapshot is dropped.
#[derive(Debug)]
pub struct Snapshot {
    pub path: PathBuf,
    pub sha: String,
    _dir: Option<tempfile::TempDir>,
}

/// External collaborator: produces filesystem snapshots of connected
/// repositories. Failure is fatal for the requesting run.
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    async fn snapshot(&self, repo: &RepoProfile, sha: Option<&str>) -> Result<Snapshot>;
}

/// Checkout provider for repositories whose working tree is reachable on
/// the local filesystem. Copies the tree so the run never observes
/// concurrent edits.
#[derive(Clone, Default)]
pub struct LocalCheckout;

#[async_trait]
impl CheckoutProvider for LocalCheckout {
    async fn snapshot(&self, repo: &RepoProfile, sha: Option<&str>) -> Result<Snapshot> {
        let source = PathBuf::from(&repo.source_root);
        if !source.is_dir() {
            return Err(AppError::SnapshotUnavailable(format!(
                "source root {} does not exist",
                source.display()
            )));
        }

        let dir = tempfile::Builder::new()
            .prefix("optforge-snap-")
            .tempdir()
            .map_err(|e| AppError::SnapshotUnavailable(format!("tempdir: {}", e)))?;

        copy_tree(&source, dir.path())
            .map_err(|e| AppError::SnapshotUnavailable(format!("copy: {}", e)))?;

        let sha = sha
            .map(str::to_string)
            .or_else(|| read_head(&source))
            .unwrap_or_else(|| "worktree".to_string());

        Ok(Snapshot {
            path: dir.path().to_path_buf(),
            sha,
            _dir: Some(dir),
        })
    }
}

fn read_head(source: &Path) -> Option<String> {
    let head = std::fs::read_to_string(source.join(".git/HEAD")).ok()?;
    let head = head.trim();
    if let Some(reference) = head.strip_prefix("ref: ") {
        let sha = std::fs::read_to_string(source.join(".git").join(reference)).ok()?;
        return Some(sha.trim().to_string());
    }
    Some(head.to_string())
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy() == ".git" {
            continue;
        }
        let target = to.join(&name);
        let path = entry.path();
        if path.is_dir() {
            copy_tree(&path, &target)?;
        } else {
            std::fs::copy(&path, &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_at(root: &Path) -> RepoProfile {
        RepoProfile {
            id: "r1".into(),
            name: "demo".into(),
            default_branch: "main".into(),
            package_manager: "npm".into(),
            source_root: root.to_string_lossy().to_string(),
            build_cmd: "true".into(),
            test_cmd: "true".into(),
            bench_cmd: None,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn snapshot_is_a_private_copy() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("app.js"), "a\n").unwrap();

        let snapshot = LocalCheckout
            .snapshot(&repo_at(source.path()), Some("abc123"))
            .await
            .unwrap();
        assert_eq!(snapshot.sha, "abc123");
        assert!(snapshot.path.join("app.js").is_file());

        // Mutating the source after the snapshot does not leak in.
        std::fs::write(source.path().join("app.js"), "b\n").unwrap();
        let copied = std::fs::read_to_string(snapshot.path.join("app.js")).unwrap();
        assert_eq!(copied, "a\n");
    }

    #[tokio::test]
    async fn missing_source_is_snapshot_unavailable() {
        let repo = repo_at(Path::new("/definitely/not/here"));
        let err = LocalCheckout.snapshot(&repo, None).await.unwrap_err();
        assert!(matches!(err, AppError::SnapshotUnavailable(_)));
    }
}

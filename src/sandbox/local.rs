use super::{ExecOutput, ResourceLimits, SandboxHandle, SandboxProvider};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Sandbox backed by a private temporary copy of the snapshot. Commands run
/// through `sh -c` with proxy variables stripped; isolation from the network
/// is best-effort here and delegated to the deployment (container, netns)
/// in production setups. The hard wall-clock budget is enforced per command
/// and the child is killed on expiry.
#[derive(Clone, Default)]
pub struct LocalSandbox;

const PROXY_VARS: &[&str] = &[
    "http_proxy",
    "https_proxy",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "ALL_PROXY",
    "all_proxy",
];

#[async_trait]
impl SandboxProvider for LocalSandbox {
    async fn provision(&self, snapshot: &Path, _limits: &ResourceLimits) -> Result<SandboxHandle> {
        let dir = tempfile::Builder::new()
            .prefix("optforge-sbx-")
            .tempdir()
            .map_err(|e| AppError::SandboxUnavailable(format!("tempdir: {}", e)))?;
        let root = dir.keep();

        copy_tree(snapshot, &root)
            .map_err(|e| AppError::SandboxUnavailable(format!("snapshot copy: {}", e)))?;

        Ok(SandboxHandle {
            id: uuid::Uuid::new_v4().to_string(),
            root,
        })
    }

    async fn execute(
        &self,
        handle: &SandboxHandle,
        command: &str,
        limits: &ResourceLimits,
        token: &CancellationToken,
    ) -> Result<ExecOutput> {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&handle.root)
            .env("OPTFORGE_SANDBOX", "1")
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            // Dropping the future on timeout or cancellation reaps the child.
            .kill_on_drop(true);
        for var in PROXY_VARS {
            cmd.env_remove(var);
        }

        let started = Instant::now();
        let output = tokio::select! {
            res = tokio::time::timeout(limits.timeout, cmd.output()) => res,
            _ = token.cancelled() => {
                return Ok(ExecOutput::cancelled_after(started.elapsed().as_millis() as u64));
            }
        };

        match output {
            Ok(Ok(out)) => Ok(ExecOutput {
                exit_code: out.status.code(),
                stdout: truncate(out.stdout, limits.max_output_bytes),
                stderr: truncate(out.stderr, limits.max_output_bytes),
                duration_ms: started.elapsed().as_millis() as u64,
                timed_out: false,
                cancelled: false,
            }),
            Ok(Err(e)) => Err(AppError::SandboxUnavailable(format!(
                "spawn '{}': {}",
                command, e
            ))),
            Err(_elapsed) => Ok(ExecOutput {
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: started.elapsed().as_millis() as u64,
                timed_out: true,
                cancelled: false,
            }),
        }
    }

    async fn teardown(&self, handle: SandboxHandle) {
        if let Err(e) = tokio::fs::remove_dir_all(&handle.root).await {
            tracing::warn!(
                "Failed to remove sandbox {}: {}",
                handle.root.display(),
                e
            );
        }
    }
}

fn truncate(bytes: Vec<u8>, limit: usize) -> String {
    let mut s = String::from_utf8_lossy(&bytes).into_owned();
    if s.len() > limit {
        s.truncate(limit);
        s.push_str("\n[truncated]");
    }
    s
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        let path = entry.path();
        if path.is_dir() {
            copy_tree(&path, &target)?;
        } else {
            std::fs::copy(&path, &target)?;
        }
    }
    Ok(())
}

mod local;
pub mod patch;

pub use local::LocalSandbox;
pub use patch::{PatchError, apply_patch};

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Resource budget for one sandbox command.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

/// An isolated working copy commands execute in.
#[derive(Debug)]
pub struct SandboxHandle {
    pub id: String,
    pub root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
    pub cancelled: bool,
}

impl ExecOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out && !self.cancelled
    }

    pub fn cancelled_after(duration_ms: u64) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms,
            timed_out: false,
            cancelled: true,
        }
    }
}

/// Provisioning is the only step whose failure is an infrastructure error;
/// command failures and timeouts are ordinary, reportable outcomes.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn provision(&self, snapshot: &Path, limits: &ResourceLimits) -> Result<SandboxHandle>;

    async fn execute(
        &self,
        handle: &SandboxHandle,
        command: &str,
        limits: &ResourceLimits,
        token: &CancellationToken,
    ) -> Result<ExecOutput>;

    async fn teardown(&self, handle: SandboxHandle);
}

use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::{ArtifactDraft, ArtifactType, BenchMetrics, Candidate, RepoProfile, Verdict};
use crate::sandbox::{ExecOutput, ResourceLimits, SandboxProvider, apply_patch};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything one sandbox validation produced. `run_artifacts` are run-level
/// (currently the baseline trace, computed at most once per run);
/// `artifacts` belong to the candidate.
#[derive(Debug)]
pub struct Validation {
    pub verdict: Verdict,
    pub baseline: Option<BenchMetrics>,
    pub candidate_metrics: Option<BenchMetrics>,
    pub delta: Option<f64>,
    pub detail: Option<String>,
    pub artifacts: Vec<ArtifactDraft>,
    pub run_artifacts: Vec<ArtifactDraft>,
}

impl Validation {
    fn short(verdict: Verdict, detail: impl Into<String>, artifacts: Vec<ArtifactDraft>) -> Self {
        Self {
            verdict,
            baseline: None,
            candidate_metrics: None,
            delta: None,
            detail: Some(detail.into()),
            artifacts,
            run_artifacts: Vec::new(),
        }
    }
}

/// Per-run baseline benchmark, computed once and shared by all concurrent
/// candidate validations. A failed computation poisons the remaining
/// candidates of the run: they report `errored` instead of retrying.
pub struct BaselineCache {
    slot: tokio::sync::Mutex<Option<std::result::Result<BenchMetrics, String>>>,
}

impl Default for BaselineCache {
    fn default() -> Self {
        Self {
            slot: tokio::sync::Mutex::new(None),
        }
    }
}

/// Runs one candidate through apply → build → test → bench inside an
/// isolated sandbox and compares it against the shared baseline.
#[derive(Clone)]
pub struct Validator {
    sandbox: Arc<dyn SandboxProvider>,
    limits: ResourceLimits,
    bench_samples: u32,
}

impl Validator {
    pub fn new(sandbox: Arc<dyn SandboxProvider>, config: &EngineConfig) -> Self {
        Self {
            sandbox,
            limits: ResourceLimits {
                timeout: config.sandbox_timeout(),
                max_output_bytes: config.max_output_bytes,
            },
            bench_samples: config.bench_samples.max(1),
        }
    }

    /// `Ok(None)` means the validation was cancelled before producing a
    /// verdict; `Err` is an infrastructure failure (sandbox provisioning),
    /// fatal for the run. Everything else, including build failures and
    /// timeouts, is an ordinary verdict.
    pub async fn validate(
        &self,
        snapshot: &Path,
        repo: &RepoProfile,
        candidate: &Candidate,
        baseline: &BaselineCache,
        token: &CancellationToken,
    ) -> Result<Option<Validation>> {
        if token.is_cancelled() {
            return Ok(None);
        }

        let handle = self.sandbox.provision(snapshot, &self.limits).await?;
        let result = self
            .validate_in(&handle, snapshot, repo, candidate, baseline, token)
            .await;
        self.sandbox.teardown(handle).await;
        result
    }

    async fn validate_in(
        &self,
        handle: &crate::sandbox::SandboxHandle,
        snapshot: &Path,
        repo: &RepoProfile,
        candidate: &Candidate,
        baseline: &BaselineCache,
        token: &CancellationToken,
    ) -> Result<Option<Validation>> {
        let mut artifacts = vec![ArtifactDraft::new(
            ArtifactType::Diff,
            "candidate.diff",
            candidate.diff.clone().into_bytes(),
        )];

        if let Err(e) = apply_patch(&handle.root, &candidate.diff) {
            artifacts.push(ArtifactDraft::new(
                ArtifactType::Log,
                "apply.log",
                e.to_string().into_bytes(),
            ));
            return Ok(Some(Validation::short(
                Verdict::Errored,
                format!("patch did not apply: {}", e),
                artifacts,
            )));
        }

        // Build
        let build = self
            .sandbox
            .execute(handle, &repo.build_cmd, &self.limits, token)
            .await?;
        if build.cancelled {
            return Ok(None);
        }
        artifacts.push(log_artifact("build.log", &build));
        if build.timed_out {
            return Ok(Some(Validation::short(
                Verdict::TimedOut,
                "build exceeded the sandbox budget",
                artifacts,
            )));
        }
        if !build.succeeded() {
            return Ok(Some(Validation::short(
                Verdict::Errored,
                format!("build failed with exit code {:?}", build.exit_code),
                artifacts,
            )));
        }

        // Tests
        let tests = self
            .sandbox
            .execute(handle, &repo.test_cmd, &self.limits, token)
            .await?;
        if tests.cancelled {
            return Ok(None);
        }
        artifacts.push(log_artifact("test.log", &tests));
        if tests.timed_out {
            return Ok(Some(Validation::short(
                Verdict::TimedOut,
                "tests exceeded the sandbox budget",
                artifacts,
            )));
        }
        if !tests.succeeded() {
            return Ok(Some(Validation::short(
                Verdict::Failed,
                format!("tests failed with exit code {:?}", tests.exit_code),
                artifacts,
            )));
        }

        // Baseline, shared across the run's candidates.
        let (baseline_result, run_artifacts) =
            self.baseline_metrics(baseline, snapshot, repo, token).await?;
        let baseline_metrics = match baseline_result {
            Ok(metrics) => metrics,
            Err(reason) => {
                return Ok(Some(Validation {
                    run_artifacts,
                    ..Validation::short(
                        Verdict::Errored,
                        format!("baseline benchmark failed: {}", reason),
                        artifacts,
                    )
                }));
            }
        };

        // Candidate benchmark
        let bench_cmd = repo.bench_cmd.as_deref().unwrap_or(&repo.test_cmd);
        let measured = self.measure(handle, bench_cmd, token).await?;
        let candidate_metrics = match measured {
            Measured::Ok(metrics, bench_log) => {
                artifacts.push(ArtifactDraft::new(
                    ArtifactType::Bench,
                    "bench.log",
                    bench_log.into_bytes(),
                ));
                metrics
            }
            Measured::Cancelled => return Ok(None),
            Measured::TimedOut => {
                return Ok(Some(Validation {
                    run_artifacts,
                    ..Validation::short(
                        Verdict::TimedOut,
                        "benchmark exceeded the sandbox budget",
                        artifacts,
                    )
                }));
            }
            Measured::CommandFailed(code) => {
                return Ok(Some(Validation {
                    run_artifacts,
                    ..Validation::short(
                        Verdict::Errored,
                        format!("benchmark failed with exit code {:?}", code),
                        artifacts,
                    )
                }));
            }
        };

        let delta = baseline_metrics.delta_against(&candidate_metrics);
        Ok(Some(Validation {
            verdict: Verdict::Passed,
            baseline: Some(baseline_metrics),
            candidate_metrics: Some(candidate_metrics),
            delta: Some(delta),
            detail: None,
            artifacts,
            run_artifacts,
        }))
    }

    /// Computes the baseline in a pristine sandbox on first use; later
    /// callers read the cached result. The lock is held across the
    /// computation so exactly one baseline run ever happens per run.
    async fn baseline_metrics(
        &self,
        cache: &BaselineCache,
        snapshot: &Path,
        repo: &RepoProfile,
        token: &CancellationToken,
    ) -> Result<(std::result::Result<BenchMetrics, String>, Vec<ArtifactDraft>)> {
        let mut slot = cache.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            return Ok((cached.clone(), Vec::new()));
        }

        let handle = self.sandbox.provision(snapshot, &self.limits).await?;
        let computed = self.compute_baseline(&handle, repo, token).await;
        self.sandbox.teardown(handle).await;
        let (result, drafts) = computed?;

        *slot = Some(result.clone());
        Ok((result, drafts))
    }

    async fn compute_baseline(
        &self,
        handle: &crate::sandbox::SandboxHandle,
        repo: &RepoProfile,
        token: &CancellationToken,
    ) -> Result<(std::result::Result<BenchMetrics, String>, Vec<ArtifactDraft>)> {
        let build = self
            .sandbox
            .execute(handle, &repo.build_cmd, &self.limits, token)
            .await?;
        if !build.succeeded() {
            return Ok((
                Err(format!(
                    "baseline build failed with exit code {:?}",
                    build.exit_code
                )),
                vec![log_artifact("baseline-build.log", &build)],
            ));
        }

        let bench_cmd = repo.bench_cmd.as_deref().unwrap_or(&repo.test_cmd);
        match self.measure(handle, bench_cmd, token).await? {
            Measured::Ok(metrics, log) => {
                let draft = ArtifactDraft::new(
                    ArtifactType::Baseline,
                    "baseline.json",
                    serde_json::to_vec(&metrics).unwrap_or_default(),
                );
                let trace = ArtifactDraft::new(ArtifactType::Trace, "baseline.log", log.into_bytes());
                Ok((Ok(metrics), vec![draft, trace]))
            }
            Measured::Cancelled => Ok((Err("cancelled".to_string()), Vec::new())),
            Measured::TimedOut => Ok((
                Err("baseline benchmark exceeded the sandbox budget".to_string()),
                Vec::new(),
            )),
            Measured::CommandFailed(code) => Ok((
                Err(format!("baseline benchmark exit code {:?}", code)),
                Vec::new(),
            )),
        }
    }

    async fn measure(
        &self,
        handle: &crate::sandbox::SandboxHandle,
        command: &str,
        token: &CancellationToken,
    ) -> Result<Measured> {
        let mut total_ms = 0.0;
        let mut reported: Option<f64> = None;
        let mut log = String::new();

        for sample in 0..self.bench_samples {
            let out = self
                .sandbox
                .execute(handle, command, &self.limits, token)
                .await?;
            if out.cancelled {
                return Ok(Measured::Cancelled);
            }
            if out.timed_out {
                return Ok(Measured::TimedOut);
            }
            if !out.succeeded() {
                return Ok(Measured::CommandFailed(out.exit_code));
            }
            total_ms += out.duration_ms as f64;
            if let Some(wall) = parse_reported_wall_ms(&out.stdout) {
                reported = Some(reported.unwrap_or(0.0) + wall);
            }
            log.push_str(&format!("--- sample {}\n{}{}", sample, out.stdout, out.stderr));
        }

        let samples = self.bench_samples;
        // A benchmark that prints its own wall_ms measurement wins over the
        // coarser process wall clock.
        let wall_ms = reported.unwrap_or(total_ms) / samples as f64;
        Ok(Measured::Ok(BenchMetrics { wall_ms, samples }, log))
    }
}

enum Measured {
    Ok(BenchMetrics, String),
    Cancelled,
    TimedOut,
    CommandFailed(Option<i32>),
}

fn log_artifact(label: &str, out: &ExecOutput) -> ArtifactDraft {
    let content = format!(
        "exit: {:?}\nduration_ms: {}\n--- stdout\n{}\n--- stderr\n{}",
        out.exit_code, out.duration_ms, out.stdout, out.stderr
    );
    ArtifactDraft::new(ArtifactType::Log, label, content.into_bytes())
}

/// Benchmarks may report a precise measurement as a final JSON line, e.g.
/// `{"wall_ms": 12.5}`.
fn parse_reported_wall_ms(stdout: &str) -> Option<f64> {
    let last = stdout.lines().rev().find(|l| !l.trim().is_empty())?;
    let value: serde_json::Value = serde_json::from_str(last.trim()).ok()?;
    value.get("wall_ms")?.as_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::Candidate;
    use crate::sandbox::LocalSandbox;

    fn repo(build: &str, test: &str, bench: Option<&str>) -> RepoProfile {
        RepoProfile {
            id: "r1".into(),
            name: "demo".into(),
            default_branch: "main".into(),
            package_manager: "npm".into(),
            source_root: String::new(),
            build_cmd: build.into(),
            test_cmd: test.into(),
            bench_cmd: bench.map(str::to_string),
            created_at: 0,
        }
    }

    fn candidate(diff: &str) -> Candidate {
        Candidate {
            id: "c1".into(),
            run_id: "run".into(),
            opportunity_id: "o1".into(),
            diff: diff.into(),
            rationale: "test".into(),
        }
    }

    fn validator() -> Validator {
        let config = EngineConfig {
            bench_samples: 1,
            sandbox_timeout_secs: 10,
            ..EngineConfig::default()
        };
        Validator::new(Arc::new(LocalSandbox), &config)
    }

    fn snapshot_with(content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), content).unwrap();
        dir
    }

    const DIFF: &str =
        "--- a/app.js\n+++ b/app.js\n@@ -1,1 +1,1 @@\n-if (xs.indexOf(x) !== -1) {}\n+if (xs.includes(x)) {}\n";

    #[tokio::test]
    async fn passing_candidate_gets_metrics_and_delta() {
        let snapshot = snapshot_with("if (xs.indexOf(x) !== -1) {}\n");
        let validation = validator()
            .validate(
                snapshot.path(),
                &repo("true", "true", None),
                &candidate(DIFF),
                &BaselineCache::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(validation.verdict, Verdict::Passed);
        assert!(validation.baseline.is_some());
        assert!(validation.candidate_metrics.is_some());
        assert!(validation.delta.is_some());
        assert!(
            validation
                .run_artifacts
                .iter()
                .any(|a| a.artifact_type == ArtifactType::Baseline)
        );
    }

    #[tokio::test]
    async fn build_failure_is_errored() {
        let snapshot = snapshot_with("if (xs.indexOf(x) !== -1) {}\n");
        let validation = validator()
            .validate(
                snapshot.path(),
                &repo("exit 1", "true", None),
                &candidate(DIFF),
                &BaselineCache::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(validation.verdict, Verdict::Errored);
    }

    #[tokio::test]
    async fn test_failure_is_failed() {
        let snapshot = snapshot_with("if (xs.indexOf(x) !== -1) {}\n");
        let validation = validator()
            .validate(
                snapshot.path(),
                &repo("true", "exit 2", None),
                &candidate(DIFF),
                &BaselineCache::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(validation.verdict, Verdict::Failed);
        assert!(
            validation
                .artifacts
                .iter()
                .any(|a| a.label == "test.log")
        );
    }

    #[tokio::test]
    async fn patch_mismatch_is_errored_without_sandbox_commands() {
        let snapshot = snapshot_with("completely different content\n");
        let validation = validator()
            .validate(
                snapshot.path(),
                &repo("true", "true", None),
                &candidate(DIFF),
                &BaselineCache::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(validation.verdict, Verdict::Errored);
        assert!(validation.detail.unwrap().contains("patch did not apply"));
    }

    #[tokio::test]
    async fn failed_baseline_poisons_later_candidates() {
        let snapshot = snapshot_with("if (xs.indexOf(x) !== -1) {}\n");
        let cache = BaselineCache::default();
        // Benchmark command fails, so the first candidate trips the baseline.
        let repo = repo("true", "true", Some("exit 9"));
        let v = validator();

        let first = v
            .validate(
                snapshot.path(),
                &repo,
                &candidate(DIFF),
                &cache,
                &CancellationToken::new(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.verdict, Verdict::Errored);
        assert!(first.detail.unwrap().contains("baseline"));

        let second = v
            .validate(
                snapshot.path(),
                &repo,
                &candidate(DIFF),
                &cache,
                &CancellationToken::new(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.verdict, Verdict::Errored);
    }

    #[tokio::test]
    async fn reported_wall_ms_overrides_process_duration() {
        assert_eq!(
            parse_reported_wall_ms("noise\n{\"wall_ms\": 42.5}\n"),
            Some(42.5)
        );
        assert_eq!(parse_reported_wall_ms("no json here"), None);
    }
}

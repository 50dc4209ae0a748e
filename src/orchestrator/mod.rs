use crate::config::EngineConfig;
use crate::error::{AppError, Result};
use crate::generator::CandidateGenerator;
use crate::models::{Candidate, EventKind, Run, RunStatus, Verdict};
use crate::repository::{RunCounter, Store};
use crate::scanner::Scanner;
use crate::snapshot::CheckoutProvider;
use crate::validator::{BaselineCache, Validation, Validator};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Drives runs through `queued → scanning → generating → testing →
/// validating → {succeeded | failed}`, with `cancelled` reachable from any
/// non-terminal phase. One driver task per run is the single writer of the
/// run's status, counters and event log; candidate validations fan out to a
/// bounded sandbox pool and report back to the driver.
#[derive(Clone)]
pub struct Orchestrator {
    store: Store,
    checkout: Arc<dyn CheckoutProvider>,
    scanner: Scanner,
    generator: CandidateGenerator,
    validator: Validator,
    config: EngineConfig,
    active: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

enum RunEnd {
    Completed,
    Cancelled,
    Failed(String),
}

impl Orchestrator {
    pub fn new(
        store: Store,
        checkout: Arc<dyn CheckoutProvider>,
        scanner: Scanner,
        validator: Validator,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            checkout,
            scanner,
            generator: CandidateGenerator,
            validator,
            config,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Creates and schedules a run. The store enforces the one-active-run
    /// constraint; a conflict surfaces before any driver work starts.
    pub async fn start_run(&self, repo_id: &str, sha: Option<&str>) -> Result<Run> {
        let repo = self.store.repos.get(repo_id).await?;
        let run = self.store.runs.create(repo_id, sha).await?;

        let token = CancellationToken::new();
        self.active
            .lock()
            .expect("active runs lock")
            .insert(run.id.clone(), token.clone());

        let orchestrator = self.clone();
        let driver_run = run.clone();
        tokio::spawn(async move {
            orchestrator.drive(driver_run, repo, token).await;
        });

        Ok(run)
    }

    /// Requests cooperative cancellation. Returns false without touching
    /// the run when it already reached a terminal state.
    pub async fn cancel_run(&self, run_id: &str) -> Result<bool> {
        let run = self.store.runs.get(run_id).await?;
        if run.status.is_terminal() {
            return Ok(false);
        }

        let token = self
            .active
            .lock()
            .expect("active runs lock")
            .get(run_id)
            .cloned();

        match token {
            Some(token) => token.cancel(),
            // No live driver (e.g. the process restarted mid-run): the run
            // would otherwise stay non-terminal forever, so finalize here.
            None => self.finalize(&run, RunEnd::Cancelled).await,
        }
        Ok(true)
    }

    async fn drive(self, run: Run, repo: crate::models::RepoProfile, token: CancellationToken) {
        tracing::info!("Run {} started for repository {}", run.id, run.repo_id);

        let end = match self.run_phases(&run, &repo, &token).await {
            Ok(end) => end,
            Err(e) => RunEnd::Failed(e.to_string()),
        };
        self.finalize(&run, end).await;

        self.active.lock().expect("active runs lock").remove(&run.id);
    }

    async fn run_phases(
        &self,
        run: &Run,
        repo: &crate::models::RepoProfile,
        token: &CancellationToken,
    ) -> Result<RunEnd> {
        // queued → scanning
        if token.is_cancelled() {
            return Ok(RunEnd::Cancelled);
        }
        self.transition(&run.id, RunStatus::Queued, RunStatus::Scanning)
            .await?;

        let snapshot = match self.checkout.snapshot(repo, run.sha.as_deref()).await {
            Ok(snapshot) => snapshot,
            Err(AppError::SnapshotUnavailable(reason)) => return Ok(RunEnd::Failed(reason)),
            Err(e) => return Err(e),
        };
        self.store.runs.set_sha(&run.id, &snapshot.sha).await?;

        let report = self.scanner.scan_tree(&run.id, &snapshot.path)?;
        for diagnostic in &report.diagnostics {
            tracing::debug!(
                "Run {}: skipped {}: {}",
                run.id,
                diagnostic.file_path,
                diagnostic.message
            );
        }
        for opportunity in &report.opportunities {
            self.store.findings.insert_opportunity(opportunity).await?;
            self.store
                .runs
                .increment_counter(&run.id, RunCounter::OpportunitiesFound, 1)
                .await?;
            self.store
                .events
                .append(
                    &run.id,
                    EventKind::OpportunityFound,
                    json!({
                        "opportunity_id": opportunity.id,
                        "pattern_kind": opportunity.pattern_kind.as_str(),
                        "file_path": opportunity.file_path,
                        "line": opportunity.start_line,
                        "confidence": opportunity.confidence,
                    }),
                )
                .await?;
        }

        // scanning → generating (zero opportunities is a valid outcome)
        if token.is_cancelled() {
            return Ok(RunEnd::Cancelled);
        }
        self.transition(&run.id, RunStatus::Scanning, RunStatus::Generating)
            .await?;

        let mut candidates = Vec::new();
        for opportunity in &report.opportunities {
            let file = snapshot.path.join(&opportunity.file_path);
            let Ok(source) = std::fs::read_to_string(&file) else {
                continue;
            };
            for draft in self.generator.generate(opportunity, &source) {
                let candidate = Candidate {
                    id: uuid::Uuid::new_v4().to_string(),
                    run_id: run.id.clone(),
                    opportunity_id: opportunity.id.clone(),
                    diff: draft.diff,
                    rationale: draft.rationale,
                };
                self.store.findings.insert_candidate(&candidate).await?;
                self.store
                    .runs
                    .increment_counter(&run.id, RunCounter::ApproachesTested, 1)
                    .await?;
                candidates.push(candidate);
            }
        }

        // generating → testing
        if token.is_cancelled() {
            return Ok(RunEnd::Cancelled);
        }
        self.transition(&run.id, RunStatus::Generating, RunStatus::Testing)
            .await?;

        // Submit every candidate to the bounded sandbox pool; cancellation
        // is re-checked before each submission.
        let semaphore = Arc::new(Semaphore::new(self.config.sandbox_concurrency.max(1)));
        let baseline = Arc::new(BaselineCache::default());
        let mut pool: JoinSet<(Candidate, Result<Option<Validation>>)> = JoinSet::new();

        for candidate in candidates {
            if token.is_cancelled() {
                break;
            }
            let validator = self.validator.clone();
            let semaphore = semaphore.clone();
            let baseline = baseline.clone();
            let repo = repo.clone();
            let snapshot_path = snapshot.path.clone();
            let task_token = token.clone();

            pool.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (candidate, Ok(None));
                };
                let result = validator
                    .validate(&snapshot_path, &repo, &candidate, &baseline, &task_token)
                    .await;
                (candidate, result)
            });
        }

        // testing → validating: verdict collection and acceptance decisions
        self.transition(&run.id, RunStatus::Testing, RunStatus::Validating)
            .await?;

        while let Some(joined) = self.next_verdict(&mut pool, token).await {
            let Ok((candidate, result)) = joined else {
                continue;
            };
            match result {
                // Sandbox provisioning failure is fatal for the whole run;
                // dropping the pool aborts the remaining validations.
                Err(e) => return Err(e),
                Ok(None) => {}
                Ok(Some(validation)) => {
                    self.record_validation(&run.id, &candidate, validation)
                        .await?;
                }
            }
        }

        if token.is_cancelled() {
            return Ok(RunEnd::Cancelled);
        }
        Ok(RunEnd::Completed)
    }

    /// Joins the next validation. After a cancellation request, in-flight
    /// work gets a bounded grace period, then the pool is aborted.
    async fn next_verdict(
        &self,
        pool: &mut JoinSet<(Candidate, Result<Option<Validation>>)>,
        token: &CancellationToken,
    ) -> Option<std::result::Result<(Candidate, Result<Option<Validation>>), tokio::task::JoinError>>
    {
        if token.is_cancelled() {
            match tokio::time::timeout(self.config.teardown_grace(), pool.join_next()).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!("Teardown grace period expired; aborting remaining sandboxes");
                    pool.abort_all();
                    None
                }
            }
        } else {
            pool.join_next().await
        }
    }

    async fn record_validation(
        &self,
        run_id: &str,
        candidate: &Candidate,
        validation: Validation,
    ) -> Result<()> {
        self.store
            .findings
            .record_validation(
                &candidate.id,
                validation.verdict,
                validation.baseline.map(|m| m.wall_ms),
                validation.candidate_metrics.map(|m| m.wall_ms),
                validation.delta,
                validation.detail.as_deref(),
            )
            .await?;
        self.store
            .runs
            .increment_counter(run_id, RunCounter::CandidatesValidated, 1)
            .await?;
        self.store
            .events
            .append(
                run_id,
                EventKind::CandidateTested,
                json!({
                    "candidate_id": candidate.id,
                    "verdict": validation.verdict.as_str(),
                    "delta": validation.delta,
                }),
            )
            .await?;

        for draft in validation.run_artifacts {
            self.store.artifacts.put(run_id, None, draft).await?;
        }

        let accepted = validation.verdict == Verdict::Passed
            && validation.delta.is_some_and(|delta| {
                delta > self.config.improvement_threshold + self.config.noise_tolerance
            });

        if accepted {
            let proposal = self.store.proposals.create(candidate).await?;
            self.store
                .runs
                .increment_counter(run_id, RunCounter::CandidatesAccepted, 1)
                .await?;
            for draft in validation.artifacts {
                self.store
                    .artifacts
                    .put(run_id, Some(&proposal.id), draft)
                    .await?;
            }
            self.store
                .events
                .append(
                    run_id,
                    EventKind::CandidateAccepted,
                    json!({
                        "candidate_id": candidate.id,
                        "proposal_id": proposal.id,
                        "delta": validation.delta,
                    }),
                )
                .await?;
        } else {
            for draft in validation.artifacts {
                self.store.artifacts.put(run_id, None, draft).await?;
            }
            let reason = match validation.verdict {
                Verdict::Passed => "delta below acceptance threshold".to_string(),
                _ => validation
                    .detail
                    .unwrap_or_else(|| validation.verdict.as_str().to_string()),
            };
            self.store
                .events
                .append(
                    run_id,
                    EventKind::CandidateRejected,
                    json!({
                        "candidate_id": candidate.id,
                        "verdict": validation.verdict.as_str(),
                        "reason": reason,
                    }),
                )
                .await?;
        }
        Ok(())
    }

    async fn transition(&self, run_id: &str, from: RunStatus, to: RunStatus) -> Result<()> {
        self.store.runs.update_status(run_id, to).await?;
        self.store
            .events
            .append(
                run_id,
                EventKind::PhaseTransition,
                json!({ "from": from.as_str(), "to": to.as_str() }),
            )
            .await?;
        Ok(())
    }

    /// Terminal transition: exactly one terminal event, status and compute
    /// minutes in one update. Best-effort; failures here are logged, not
    /// propagated, since there is no caller left to handle them.
    async fn finalize(&self, run: &Run, end: RunEnd) {
        let minutes =
            (chrono::Utc::now().timestamp_millis() - run.created_at) as f64 / 60_000.0;

        let (status, kind, payload, reason) = match end {
            RunEnd::Completed => {
                let counters = self.store.runs.get(&run.id).await.ok();
                (
                    RunStatus::Succeeded,
                    EventKind::RunCompleted,
                    json!({
                        "opportunities_found":
                            counters.as_ref().map_or(0, |r| r.opportunities_found),
                        "candidates_validated":
                            counters.as_ref().map_or(0, |r| r.candidates_validated),
                        "candidates_accepted":
                            counters.as_ref().map_or(0, |r| r.candidates_accepted),
                    }),
                    None,
                )
            }
            RunEnd::Failed(reason) => (
                RunStatus::Failed,
                EventKind::RunFailed,
                json!({ "reason": reason.clone() }),
                Some(reason),
            ),
            RunEnd::Cancelled => (
                RunStatus::Cancelled,
                EventKind::RunCancelled,
                json!({}),
                None,
            ),
        };

        // The guarded update makes finalization exactly-once: if another
        // finalizer already recorded a terminal status (e.g. a cancel racing
        // the driver's own completion), no second terminal event is written.
        match self
            .store
            .runs
            .finish(&run.id, status, minutes, reason.as_deref())
            .await
        {
            Ok(true) => {
                if let Err(e) = self.store.events.append(&run.id, kind, payload).await {
                    tracing::error!(
                        "Failed to append terminal event for run {}: {}",
                        run.id,
                        e
                    );
                }
                tracing::info!("Run {} finished: {}", run.id, status.as_str());
            }
            Ok(false) => {
                tracing::debug!(
                    "Run {} already terminal; skipping {} finalization",
                    run.id,
                    status.as_str()
                );
            }
            Err(e) => {
                tracing::error!("Failed to finalize run {}: {}", run.id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PatternKind, RepoProfile};
    use crate::repository::establish_connection;
    use crate::sandbox::LocalSandbox;
    use crate::scanner::PatternRegistry;
    use crate::snapshot::LocalCheckout;
    use std::path::Path;
    use std::time::Duration;

    async fn engine(threshold: f64) -> (Orchestrator, Store) {
        let pool = establish_connection("sqlite::memory:").await.unwrap();
        let store = Store::new(pool);
        let config = EngineConfig {
            improvement_threshold: threshold,
            noise_tolerance: 0.0,
            bench_samples: 1,
            sandbox_concurrency: 2,
            sandbox_timeout_secs: 30,
            ..EngineConfig::default()
        };
        let sandbox = Arc::new(LocalSandbox);
        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(LocalCheckout),
            Scanner::new(Arc::new(PatternRegistry::default())),
            Validator::new(sandbox, &config),
            config,
        );
        (orchestrator, store)
    }

    async fn register_repo(store: &Store, source_root: &Path) -> String {
        let repo = RepoProfile {
            id: "repo-1".into(),
            name: "demo".into(),
            default_branch: "main".into(),
            package_manager: "npm".into(),
            source_root: source_root.to_string_lossy().to_string(),
            build_cmd: "true".into(),
            test_cmd: "true".into(),
            bench_cmd: None,
            created_at: 0,
        };
        store.repos.upsert(&repo).await.unwrap();
        repo.id
    }

    async fn wait_terminal(store: &Store, run_id: &str) -> Run {
        for _ in 0..600 {
            let run = store.runs.get(run_id).await.unwrap();
            if run.status.is_terminal() {
                return run;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("run {} never reached a terminal state", run_id);
    }

    #[tokio::test]
    async fn clean_repo_succeeds_with_zero_counters() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(
            source.path().join("ok.js"),
            "export function sum(xs) {\n  return xs.reduce((a, b) => a + b, 0);\n}\n",
        )
        .unwrap();

        let (orchestrator, store) = engine(0.05).await;
        let repo_id = register_repo(&store, source.path()).await;

        let run = orchestrator.start_run(&repo_id, None).await.unwrap();
        assert_eq!(run.status, RunStatus::Queued);

        let done = wait_terminal(&store, &run.id).await;
        assert_eq!(done.status, RunStatus::Succeeded);
        assert_eq!(done.opportunities_found, 0);
        assert_eq!(done.candidates_accepted, 0);
        assert!(done.compute_minutes.is_some());
    }

    #[tokio::test]
    async fn accepted_candidate_produces_matching_proposal() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(
            source.path().join("app.js"),
            "if (xs.indexOf(x) !== -1) {\n  use(x);\n}\n",
        )
        .unwrap();

        // Threshold below any possible delta: every passing candidate is
        // accepted, which pins down the proposal round-trip.
        let (orchestrator, store) = engine(-10.0).await;
        let repo_id = register_repo(&store, source.path()).await;

        let run = orchestrator.start_run(&repo_id, None).await.unwrap();
        let done = wait_terminal(&store, &run.id).await;

        assert_eq!(done.status, RunStatus::Succeeded);
        assert_eq!(done.opportunities_found, 1);
        assert_eq!(done.approaches_tested, 1);
        assert_eq!(done.candidates_validated, 1);
        assert_eq!(done.candidates_accepted, 1);

        let candidates = store.findings.list_candidates(&run.id).await.unwrap();
        let proposals = store.proposals.list_for_run(&run.id).await.unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].diff, candidates[0].diff);

        // Accepted candidates carry proposal-scoped artifacts; the baseline
        // stays run-level.
        let artifacts = store.artifacts.list_for_run(&run.id).await.unwrap();
        assert!(artifacts.iter().any(|a| a.proposal_id.is_some()));
        assert!(
            artifacts
                .iter()
                .any(|a| a.proposal_id.is_none()
                    && a.artifact_type == crate::models::ArtifactType::Baseline)
        );
    }

    #[tokio::test]
    async fn below_threshold_candidate_is_rejected_despite_passing() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(
            source.path().join("app.js"),
            "if (xs.indexOf(x) !== -1) {\n  use(x);\n}\n",
        )
        .unwrap();

        // Unreachable threshold: passing tests are not enough.
        let (orchestrator, store) = engine(10.0).await;
        let repo_id = register_repo(&store, source.path()).await;

        let run = orchestrator.start_run(&repo_id, None).await.unwrap();
        let done = wait_terminal(&store, &run.id).await;

        assert_eq!(done.status, RunStatus::Succeeded);
        assert_eq!(done.candidates_validated, 1);
        assert_eq!(done.candidates_accepted, 0);
        assert!(store.proposals.list_for_run(&run.id).await.unwrap().is_empty());

        let events = store.events.list_after(&run.id, -1).await.unwrap();
        assert!(
            events
                .iter()
                .any(|e| e.kind == EventKind::CandidateRejected)
        );
    }

    #[tokio::test]
    async fn event_sequences_are_gapless() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(
            source.path().join("app.js"),
            "if (a.indexOf(x) !== -1) {}\nif (b.indexOf(y) >= 0) {}\nif (c.indexOf(z) === -1) {}\n",
        )
        .unwrap();

        let (orchestrator, store) = engine(-10.0).await;
        let repo_id = register_repo(&store, source.path()).await;

        let run = orchestrator.start_run(&repo_id, None).await.unwrap();
        let done = wait_terminal(&store, &run.id).await;
        assert_eq!(done.status, RunStatus::Succeeded);
        assert_eq!(done.opportunities_found, 3);

        let events = store.events.list_after(&run.id, -1).await.unwrap();
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.sequence, i as i64);
        }
        assert_eq!(events.last().unwrap().kind, EventKind::RunCompleted);
    }

    #[tokio::test]
    async fn missing_snapshot_fails_the_run_with_reason() {
        let (orchestrator, store) = engine(0.05).await;
        let repo = RepoProfile {
            id: "repo-gone".into(),
            name: "gone".into(),
            default_branch: "main".into(),
            package_manager: "npm".into(),
            source_root: "/nonexistent/path".into(),
            build_cmd: "true".into(),
            test_cmd: "true".into(),
            bench_cmd: None,
            created_at: 0,
        };
        store.repos.upsert(&repo).await.unwrap();

        let run = orchestrator.start_run(&repo.id, None).await.unwrap();
        let done = wait_terminal(&store, &run.id).await;

        assert_eq!(done.status, RunStatus::Failed);
        assert!(done.failure_reason.is_some());

        let events = store.events.list_after(&run.id, -1).await.unwrap();
        let terminal = events.last().unwrap();
        assert_eq!(terminal.kind, EventKind::RunFailed);
        assert!(terminal.payload.contains("reason"));
    }

    #[tokio::test]
    async fn cancelling_a_terminal_run_is_a_noop() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("ok.js"), "const a = 1;\n").unwrap();

        let (orchestrator, store) = engine(0.05).await;
        let repo_id = register_repo(&store, source.path()).await;

        let run = orchestrator.start_run(&repo_id, None).await.unwrap();
        let done = wait_terminal(&store, &run.id).await;
        assert_eq!(done.status, RunStatus::Succeeded);

        let events_before = store.events.list_after(&run.id, -1).await.unwrap().len();
        let cancelled = orchestrator.cancel_run(&run.id).await.unwrap();
        assert!(!cancelled);

        let after = store.runs.get(&run.id).await.unwrap();
        assert_eq!(after.status, RunStatus::Succeeded);
        let events_after = store.events.list_after(&run.id, -1).await.unwrap().len();
        assert_eq!(events_before, events_after);
    }

    #[tokio::test]
    async fn late_cancel_finalization_loses_to_completion() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("ok.js"), "const a = 1;\n").unwrap();

        let (orchestrator, store) = engine(0.05).await;
        let repo_id = register_repo(&store, source.path()).await;

        let run = orchestrator.start_run(&repo_id, None).await.unwrap();
        let done = wait_terminal(&store, &run.id).await;
        assert_eq!(done.status, RunStatus::Succeeded);

        // A cancel that read the run as non-terminal just before the driver
        // finished would reach finalize after completion. It must neither
        // flip the status nor append a second terminal event.
        let events_before = store.events.list_after(&run.id, -1).await.unwrap().len();
        orchestrator.finalize(&run, RunEnd::Cancelled).await;

        let after = store.runs.get(&run.id).await.unwrap();
        assert_eq!(after.status, RunStatus::Succeeded);
        let events = store.events.list_after(&run.id, -1).await.unwrap();
        assert_eq!(events.len(), events_before);
        assert_eq!(events.last().unwrap().kind, EventKind::RunCompleted);
    }

    #[tokio::test]
    async fn second_run_conflicts_while_first_is_active() {
        let source = tempfile::tempdir().unwrap();
        // A slow test command keeps the first run non-terminal long enough.
        std::fs::write(
            source.path().join("app.js"),
            "if (xs.indexOf(x) !== -1) {}\n",
        )
        .unwrap();

        let (orchestrator, store) = engine(0.05).await;
        let repo = RepoProfile {
            id: "repo-busy".into(),
            name: "busy".into(),
            default_branch: "main".into(),
            package_manager: "npm".into(),
            source_root: source.path().to_string_lossy().to_string(),
            build_cmd: "sleep 2".into(),
            test_cmd: "true".into(),
            bench_cmd: None,
            created_at: 0,
        };
        store.repos.upsert(&repo).await.unwrap();

        let first = orchestrator.start_run(&repo.id, None).await.unwrap();
        let err = orchestrator.start_run(&repo.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::RunConflict(_)));

        // Cancel so the test does not wait on the sleep.
        assert!(orchestrator.cancel_run(&first.id).await.unwrap());
        let done = wait_terminal(&store, &first.id).await;
        assert_eq!(done.status, RunStatus::Cancelled);

        let events = store.events.list_after(&first.id, -1).await.unwrap();
        assert_eq!(events.last().unwrap().kind, EventKind::RunCancelled);
    }

    #[tokio::test]
    async fn scan_only_fixture_counts_every_loop_pattern() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(
            source.path().join("loops.js"),
            "for (const x of xs) {\n  out += 'row';\n  const hit = ys.find(y => y === x);\n  acc = [...acc, x];\n  const re = new RegExp(x.prefix);\n}\nconst topLevel = /outside/;\n",
        )
        .unwrap();

        let (orchestrator, store) = engine(0.05).await;
        let repo_id = register_repo(&store, source.path()).await;

        let run = orchestrator.start_run(&repo_id, None).await.unwrap();
        let done = wait_terminal(&store, &run.id).await;
        assert_eq!(done.status, RunStatus::Succeeded);
        assert_eq!(done.opportunities_found, 4);

        let opportunities = store.findings.list_opportunities(&run.id).await.unwrap();
        let kinds: Vec<PatternKind> =
            opportunities.iter().map(|o| o.pattern_kind).collect();
        assert!(kinds.contains(&PatternKind::LoopStringConcat));
        assert!(kinds.contains(&PatternKind::LoopArrayFind));
        assert!(kinds.contains(&PatternKind::LoopSpread));
        assert!(kinds.contains(&PatternKind::LoopRegexConstruction));
    }
}

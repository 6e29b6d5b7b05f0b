//! Parallel PlantUML rendering with a staleness filter.
//!
//! Inputs whose `.svg` output already postdates the source are skipped; the
//! rest are fanned out over a fixed pool of workers, one `java -jar` process
//! per diagram. Workers drain a shared job channel and report typed outcomes
//! back through a result channel; the aggregate result depends only on the
//! multiset of outcomes, never on completion order.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Fixed arguments passed to every PlantUML invocation.
const RENDER_ARGS: &[&str] = &["-nometadata", "-tsvg"];

/// One render job: a source diagram and its derived output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInput {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl JobInput {
    /// Derive the output path by suffix substitution (`flow.puml` ->
    /// `flow.svg`).
    pub fn from_input(input: PathBuf) -> Self {
        let output = input.with_extension("svg");
        Self { input, output }
    }
}

/// Exit status of one render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed,
}

/// Outcome of one job, as reported by a worker.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job: JobInput,
    pub status: JobStatus,
}

/// True when `job.input` must be rebuilt.
///
/// An output that is missing, unreadable, or not strictly newer than the
/// input counts as stale: equal mtimes cannot prove the output postdates the
/// input, so ties rebuild.
pub fn is_stale(job: &JobInput) -> bool {
    let output_mtime = match std::fs::metadata(&job.output).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return true,
    };

    match std::fs::metadata(&job.input).and_then(|m| m.modified()) {
        Ok(input_mtime) => output_mtime <= input_mtime,
        Err(_) => true,
    }
}

/// Filter `inputs` down to the jobs whose output is missing or out of date.
pub fn stale_jobs(inputs: &[PathBuf]) -> Vec<JobInput> {
    inputs
        .iter()
        .cloned()
        .map(JobInput::from_input)
        .filter(|job| {
            let stale = is_stale(job);
            if !stale {
                debug!(input = %job.input.display(), "output up to date, skipping");
            }
            stale
        })
        .collect()
}

/// Spawns one PlantUML process per diagram.
#[derive(Debug, Clone)]
pub struct Renderer {
    /// Verified path to the PlantUML jar.
    jar: PathBuf,

    /// Java binary to invoke (default: "java")
    java_bin: String,
}

impl Renderer {
    /// Renderer for a verified jar, using `java` from PATH.
    pub fn new(jar: PathBuf) -> Self {
        Self {
            jar,
            java_bin: "java".to_string(),
        }
    }

    /// Override the java binary (used by tests to substitute stub commands).
    pub fn with_java_bin(mut self, java_bin: impl Into<String>) -> Self {
        self.java_bin = java_bin.into();
        self
    }

    /// Render one diagram, observing only the process exit status. Stdio is
    /// inherited, so PlantUML's own diagnostics pass through. A spawn
    /// failure counts the same as a non-zero exit.
    async fn render(&self, job: &JobInput) -> JobStatus {
        let result = Command::new(&self.java_bin)
            .arg("-jar")
            .arg(&self.jar)
            .args(RENDER_ARGS)
            .arg(&job.input)
            .status()
            .await;

        match result {
            Ok(status) if status.success() => JobStatus::Succeeded,
            Ok(status) => {
                warn!(input = %job.input.display(), %status, "render failed");
                JobStatus::Failed
            }
            Err(e) => {
                warn!(input = %job.input.display(), error = %e, "failed to spawn renderer");
                JobStatus::Failed
            }
        }
    }
}

/// Default pool size: one worker per available execution unit.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Run `jobs` across a pool of `workers` concurrent renderers and collect
/// every outcome. There is no timeout and no cancellation: every dispatched
/// job runs to completion regardless of earlier failures.
pub async fn run_pool(renderer: &Renderer, jobs: Vec<JobInput>, workers: usize) -> Vec<JobOutcome> {
    let total = jobs.len();
    if total == 0 {
        return Vec::new();
    }

    // Channel capacity equals the job count, so queueing never blocks.
    let (job_tx, job_rx) = mpsc::channel::<JobInput>(total);
    for job in jobs {
        let _ = job_tx.send(job).await;
    }
    drop(job_tx);

    let job_rx = Arc::new(Mutex::new(job_rx));
    let (outcome_tx, mut outcome_rx) = mpsc::channel::<JobOutcome>(total);

    let mut handles = Vec::new();
    for _ in 0..workers.max(1) {
        let renderer = renderer.clone();
        let job_rx = Arc::clone(&job_rx);
        let outcome_tx = outcome_tx.clone();

        handles.push(tokio::spawn(async move {
            loop {
                // Hold the lock only while taking the next job
                let job = { job_rx.lock().await.recv().await };
                let Some(job) = job else { break };

                let status = renderer.render(&job).await;
                let _ = outcome_tx.send(JobOutcome { job, status }).await;
            }
        }));
    }
    drop(outcome_tx);

    let mut outcomes = Vec::with_capacity(total);
    while let Some(outcome) = outcome_rx.recv().await {
        outcomes.push(outcome);
    }

    for handle in handles {
        let _ = handle.await;
    }

    outcomes
}

/// True iff no job in the batch failed. Order-independent.
pub fn all_succeeded(outcomes: &[JobOutcome]) -> bool {
    outcomes.iter().all(|o| o.status == JobStatus::Succeeded)
}

/// Render every stale diagram in `inputs`.
///
/// Returns true when all scheduled jobs succeeded; an empty work set is an
/// immediate success with zero spawns.
pub async fn run(renderer: &Renderer, inputs: &[PathBuf]) -> bool {
    let jobs = stale_jobs(inputs);
    if jobs.is_empty() {
        debug!("all outputs up to date, nothing to render");
        return true;
    }

    info!(jobs = jobs.len(), "rendering stale diagrams");
    let outcomes = run_pool(renderer, jobs, default_workers()).await;

    let failed = outcomes
        .iter()
        .filter(|o| o.status == JobStatus::Failed)
        .count();
    if failed > 0 {
        warn!(failed, total = outcomes.len(), "some diagrams failed to render");
    }

    all_succeeded(&outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_suffix_substitution() {
        let job = JobInput::from_input(PathBuf::from("docs/flow.puml"));
        assert_eq!(job.output, PathBuf::from("docs/flow.svg"));
    }

    #[test]
    fn test_reduction_is_order_independent() {
        let ok = JobOutcome {
            job: JobInput::from_input(PathBuf::from("a.puml")),
            status: JobStatus::Succeeded,
        };
        let bad = JobOutcome {
            job: JobInput::from_input(PathBuf::from("b.puml")),
            status: JobStatus::Failed,
        };

        let forward = vec![ok.clone(), bad.clone()];
        let backward = vec![bad, ok];
        assert_eq!(all_succeeded(&forward), all_succeeded(&backward));
        assert!(!all_succeeded(&forward));
    }

    #[test]
    fn test_empty_batch_succeeds() {
        assert!(all_succeeded(&[]));
    }

    #[test]
    fn test_default_workers_at_least_one() {
        assert!(default_workers() >= 1);
    }

    #[test]
    fn test_missing_files_are_stale() {
        let job = JobInput::from_input(PathBuf::from("/nonexistent/diagram.puml"));
        assert!(is_stale(&job));
    }
}

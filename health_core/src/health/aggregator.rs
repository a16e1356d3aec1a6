//! Bounded parallel execution of probes.
//!
//! Every task is spawned at once and reports into a shared channel. The collector
//! races that channel against a single deadline and keeps whatever arrived. Tasks
//! still running at the deadline are abandoned, not cancelled; their late sends fail
//! silently once the receiver is dropped.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::probe::{Probe, ProbeResult};
use super::status::HealthStatus;

/// Results of a deadline race: what completed, and the names that never reported.
#[derive(Debug)]
pub struct Collected<T> {
    pub completed: HashMap<String, T>,
    pub pending: Vec<String>,
}

/// Runs `tasks` concurrently and returns whatever completes within `budget`.
///
/// Names must be unique. A task that panics never reports and ends up in `pending`.
pub async fn race_deadline<T, F>(tasks: Vec<(String, F)>, budget: Duration) -> Collected<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let expected: Vec<String> = tasks.iter().map(|(name, _)| name.clone()).collect();
    let (tx, mut rx) = mpsc::channel::<(String, T)>(expected.len().max(1));

    for (name, task) in tasks {
        let tx = tx.clone();
        tokio::spawn(async move {
            let value = task.await;
            if tx.send((name, value)).await.is_err() {
                debug!("Result arrived after the deadline and was dropped");
            }
        });
    }
    drop(tx);

    let deadline = tokio::time::sleep(budget);
    tokio::pin!(deadline);

    let mut completed = HashMap::with_capacity(expected.len());
    let mut received = 0;

    while received < expected.len() {
        tokio::select! {
            next = rx.recv() => match next {
                Some((name, value)) => {
                    completed.insert(name, value);
                    received += 1;
                }
                // All senders dropped: the remaining tasks panicked.
                None => break,
            },
            _ = &mut deadline => {
                debug!("Deadline of {:?} elapsed with {} of {} results", budget, received, expected.len());
                break;
            }
        }
    }

    let pending = expected
        .into_iter()
        .filter(|name| !completed.contains_key(name))
        .collect();

    Collected { completed, pending }
}

/// Runs a fixed probe set either in parallel under a budget or one after another.
#[derive(Clone)]
pub struct ProbeAggregator {
    probes: Vec<Arc<dyn Probe>>,
    budget: Duration,
}

impl ProbeAggregator {
    pub fn new(probes: Vec<Arc<dyn Probe>>, budget: Duration) -> Self {
        Self { probes, budget }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn probe_names(&self) -> Vec<String> {
        self.probes.iter().map(|p| p.name().to_string()).collect()
    }

    /// Every configured probe name is present in the returned map. Probes that miss
    /// the budget are reported as timed out with the full budget as latency.
    pub async fn run_parallel(&self) -> BTreeMap<String, ProbeResult> {
        let start = Instant::now();
        info!("Running {} health probes in parallel (budget {:?})", self.probes.len(), self.budget);

        let tasks = self
            .probes
            .iter()
            .map(|probe| {
                let probe = Arc::clone(probe);
                (probe.name().to_string(), async move { probe.run().await })
            })
            .collect();

        let collected = race_deadline(tasks, self.budget).await;

        let mut results: BTreeMap<String, ProbeResult> = collected
            .completed
            .into_iter()
            .map(|(name, mut result)| {
                result.name = name.clone();
                (name, result)
            })
            .collect();

        for name in collected.pending {
            results.insert(name.clone(), ProbeResult::timed_out(name, self.budget));
        }

        for result in results.values() {
            log_result(result);
        }

        debug!("Parallel probe phase finished in {:?}", start.elapsed());
        results
    }

    /// Runs the probes in order with no deadline. Each probe bounds its own calls.
    pub async fn run_sequential(&self) -> BTreeMap<String, ProbeResult> {
        let mut results = BTreeMap::new();

        for probe in &self.probes {
            let mut result = probe.run().await;
            result.name = probe.name().to_string();
            log_result(&result);
            results.insert(result.name.clone(), result);
        }

        results
    }
}

fn log_result(result: &ProbeResult) {
    match result.status {
        HealthStatus::Healthy => {
            info!(probe = %result.name, latency_ms = result.response_time_ms(), "Health probe passed");
        }
        HealthStatus::Warning | HealthStatus::Timeout => {
            warn!(
                probe = %result.name,
                status = %result.status,
                latency_ms = result.response_time_ms(),
                error = result.error.as_deref().unwrap_or_default(),
                "Health probe degraded"
            );
        }
        HealthStatus::Unhealthy | HealthStatus::Critical => {
            error!(
                probe = %result.name,
                status = %result.status,
                latency_ms = result.response_time_ms(),
                error = result.error.as_deref().unwrap_or_default(),
                "Health probe failed"
            );
        }
    }
}

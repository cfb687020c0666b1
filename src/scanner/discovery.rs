//! Auto-discovery of scan targets by probing candidates for resources.

use std::future::Future;

use futures::{stream, StreamExt};
use tracing::{info, warn};

use super::MAX_PROBE_CONCURRENCY;

/// Probe errors shown in full before the remainder is summarised as a count.
const PROBE_ERROR_DETAIL_LIMIT: usize = 5;

/// Result of probing one candidate target.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// The candidate holds at least one scannable resource.
    pub has_resources: bool,
    /// Probe failure, if any. An errored candidate is excluded from the
    /// active set but never fails discovery as a whole.
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn active() -> Self {
        Self { has_resources: true, error: None }
    }

    pub fn inactive() -> Self {
        Self { has_resources: false, error: None }
    }

    pub fn errored(message: impl Into<String>) -> Self {
        Self { has_resources: false, error: Some(message.into()) }
    }
}

/// Probe every candidate concurrently and return the active ones, sorted
/// lexicographically for deterministic output across runs.
///
/// Candidates whose probe errors are reported as a bounded warning summary
/// (first [`PROBE_ERROR_DETAIL_LIMIT`] in full, remainder counted). If no
/// candidate is active the documented `fallback` target is returned instead
/// of an empty scan.
pub async fn discover_targets<F, Fut>(
    candidates: Vec<String>,
    probe: F,
    fallback: &str,
) -> Vec<String>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = ProbeOutcome>,
{
    let concurrency = MAX_PROBE_CONCURRENCY.min(candidates.len()).max(1);
    let probe = &probe;

    let outcomes: Vec<(String, ProbeOutcome)> = stream::iter(candidates)
        .map(|candidate| async move {
            let outcome = probe(candidate.clone()).await;
            (candidate, outcome)
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut active: Vec<String> = Vec::new();
    let mut errors: Vec<(String, String)> = Vec::new();

    for (candidate, outcome) in outcomes {
        if outcome.has_resources {
            active.push(candidate);
        } else if let Some(error) = outcome.error {
            errors.push((candidate, error));
        }
    }

    if !errors.is_empty() {
        warn!("could not check {} candidate target(s):", errors.len());
        for (candidate, error) in errors.iter().take(PROBE_ERROR_DETAIL_LIMIT) {
            let truncated: String = error.chars().take(80).collect();
            warn!("  {candidate}: {truncated}");
        }
        if errors.len() > PROBE_ERROR_DETAIL_LIMIT {
            warn!("  ... and {} more", errors.len() - PROBE_ERROR_DETAIL_LIMIT);
        }
    }

    if active.is_empty() {
        info!("no active targets detected, falling back to {fallback}");
        return vec![fallback.to_string()];
    }

    active.sort();
    active
}

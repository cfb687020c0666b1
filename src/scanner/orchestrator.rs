//! Cross-target scan orchestration and fatal-error propagation.

use std::future::Future;

use futures::{stream, StreamExt};
use indicatif::ProgressBar;
use tracing::{info, warn};

use super::{
    scan_target, FatalKind, FatalTargetError, ScanError, SelectionMode, TargetOrigin,
    TargetOutcome, MAX_TARGET_CONCURRENCY,
};
use crate::{finding::Finding, rules::Registry};

/// One planned scan target together with how it was selected.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub id: String,
    pub origin: TargetOrigin,
}

/// The resolved set of targets for one scan invocation.
#[derive(Debug, Clone)]
pub struct TargetPlan {
    pub mode: SelectionMode,
    pub targets: Vec<TargetSpec>,
}

impl TargetPlan {
    /// Targets named by the caller. A fatal failure of any of these aborts
    /// the scan.
    pub fn explicit(targets: Vec<String>) -> Self {
        Self {
            mode: SelectionMode::Explicit,
            targets: targets
                .into_iter()
                .map(|id| TargetSpec { id, origin: TargetOrigin::Explicit })
                .collect(),
        }
    }

    /// Targets produced by auto-discovery. Fatal failures are downgraded to
    /// warnings.
    pub fn discovered(targets: Vec<String>) -> Self {
        Self {
            mode: SelectionMode::Auto,
            targets: targets
                .into_iter()
                .map(|id| TargetSpec { id, origin: TargetOrigin::Discovered })
                .collect(),
        }
    }

    pub fn target_ids(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.id.clone()).collect()
    }
}

/// Aggregated result of a whole scan, handed to the rendering layer.
#[derive(Debug)]
pub struct ScanReport {
    pub selection_mode: SelectionMode,
    pub findings: Vec<Finding>,
    pub targets_scanned: Vec<String>,
    pub outcomes: Vec<TargetOutcome>,
}

/// Scan every planned target concurrently and aggregate the findings.
///
/// `connect` builds the per-target client context (the session factory);
/// its failures are treated like a fatal target error of kind `Session`.
/// Findings are appended in completion order, not plan order. When an
/// explicitly requested target fails fatally the error propagates
/// immediately and in-flight sibling scans are abandoned.
pub async fn run_scan<C, F, Fut>(
    plan: &TargetPlan,
    rules: &Registry<C>,
    connect: F,
    progress: Option<&ProgressBar>,
) -> Result<ScanReport, ScanError>
where
    C: Sync,
    F: Fn(&TargetSpec) -> Fut,
    Fut: Future<Output = anyhow::Result<C>>,
{
    let concurrency = MAX_TARGET_CONCURRENCY.min(plan.targets.len()).max(1);
    let connect = &connect;

    let mut completed = stream::iter(plan.targets.iter())
        .map(|spec| async move {
            let result = async {
                let client = connect(spec).await.map_err(|err| FatalTargetError {
                    kind: FatalKind::Session,
                    message: format!("failed to create session for '{}': {err:#}", spec.id),
                })?;
                scan_target(&client, &spec.id, spec.origin, rules).await
            }
            .await;
            (spec, result)
        })
        .buffer_unordered(concurrency);

    let mut findings: Vec<Finding> = Vec::new();
    let mut outcomes: Vec<TargetOutcome> = Vec::new();

    while let Some((spec, result)) = completed.next().await {
        if let Some(pb) = progress {
            pb.inc(1);
        }
        match result {
            Ok(outcome) => {
                info!(
                    "completed target {} ({} findings, {}/{} rules succeeded)",
                    spec.id,
                    outcome.findings.len(),
                    outcome.rules_succeeded,
                    outcome.rules_succeeded + outcome.rules_failed,
                );
                findings.extend(outcome.findings.iter().cloned());
                outcomes.push(outcome);
            }
            Err(fatal) => match spec.origin {
                TargetOrigin::Explicit => {
                    // Dropping the stream abandons the in-flight siblings.
                    if fatal.kind == FatalKind::Permission {
                        return Err(ScanError::Permission(fatal.message));
                    }
                    return Err(ScanError::FatalTarget { target: spec.id.clone(), source: fatal });
                }
                TargetOrigin::Discovered => {
                    warn!("skipping auto-discovered target {}: {fatal}", spec.id);
                    outcomes.push(TargetOutcome::fatal(spec.id.clone(), spec.origin, rules.len()));
                }
            },
        }
    }

    Ok(ScanReport {
        selection_mode: plan.mode,
        findings,
        targets_scanned: plan.target_ids(),
        outcomes,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::scanner::{
        target::tests::{registry, Behavior, FakeRule},
        FailureClassification,
    };

    fn four_rules_two_findings_each() -> Registry<()> {
        registry(vec![
            FakeRule { id: "r.one", behavior: Behavior::Findings(2) },
            FakeRule { id: "r.two", behavior: Behavior::Findings(2) },
            FakeRule { id: "r.three", behavior: Behavior::Findings(2) },
            FakeRule { id: "r.four", behavior: Behavior::Findings(2) },
        ])
    }

    #[tokio::test]
    async fn explicit_multi_target_scan_aggregates_all_findings() {
        let rules = four_rules_two_findings_each();
        let plan = TargetPlan::explicit(vec![
            "us-east-1".into(),
            "eu-west-1".into(),
            "ap-south-1".into(),
        ]);
        let report = run_scan(&plan, &rules, |_| async { Ok(()) }, None).await.unwrap();

        assert_eq!(report.selection_mode, SelectionMode::Explicit);
        assert_eq!(report.findings.len(), 24);
        assert_eq!(report.targets_scanned.len(), 3);
        assert!(report.findings.iter().all(|f| f.target.is_some()));
    }

    #[tokio::test]
    async fn explicit_fatal_target_aborts_the_scan() {
        let rules = registry(vec![
            FakeRule { id: "a", behavior: Behavior::FailConnectivity },
            FakeRule { id: "b", behavior: Behavior::FailConnectivity },
            FakeRule { id: "c", behavior: Behavior::FailConnectivity },
            FakeRule { id: "d", behavior: Behavior::FailConnectivity },
        ]);
        let plan = TargetPlan::explicit(vec!["us-fake-1".into()]);
        let err = run_scan(&plan, &rules, |_| async { Ok(()) }, None)
            .await
            .expect_err("explicit fatal target must abort");
        match err {
            ScanError::FatalTarget { target, source } => {
                assert_eq!(target, "us-fake-1");
                assert_eq!(source.kind, FatalKind::Unreachable);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn discovered_fatal_target_is_skipped_not_propagated() {
        // All rules fail everywhere, so every discovered target is fatal;
        // the scan must still complete with zero findings.
        let rules = registry(vec![
            FakeRule { id: "a", behavior: Behavior::FailConnectivity },
            FakeRule { id: "b", behavior: Behavior::FailApi },
        ]);
        let plan = TargetPlan::discovered(vec!["eu-north-1".into(), "sa-east-1".into()]);
        let report = run_scan(&plan, &rules, |_| async { Ok(()) }, None).await.unwrap();

        assert_eq!(report.findings.len(), 0);
        assert_eq!(report.outcomes.len(), 2);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.classification == FailureClassification::Fatal));
    }

    #[tokio::test]
    async fn explicit_all_permission_target_surfaces_permission_error() {
        let rules = registry(vec![
            FakeRule { id: "a", behavior: Behavior::FailPermission },
            FakeRule { id: "b", behavior: Behavior::FailPermission },
        ]);
        let plan = TargetPlan::explicit(vec!["us-east-1".into()]);
        let err = run_scan(&plan, &rules, |_| async { Ok(()) }, None)
            .await
            .expect_err("permission-only failure must surface as such");
        assert!(matches!(err, ScanError::Permission(_)));
    }

    #[tokio::test]
    async fn session_failure_on_explicit_target_is_fatal() {
        let rules = four_rules_two_findings_each();
        let plan = TargetPlan::explicit(vec!["us-east-1".into()]);
        let err = run_scan(
            &plan,
            &rules,
            |_| async { anyhow::bail!("no credentials available") },
            None,
        )
        .await
        .expect_err("session failure must abort an explicit scan");
        match err {
            ScanError::FatalTarget { source, .. } => assert_eq!(source.kind, FatalKind::Session),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn partial_rule_failure_does_not_fail_the_target() {
        let rules = registry(vec![
            FakeRule { id: "ok", behavior: Behavior::Findings(1) },
            FakeRule { id: "broken", behavior: Behavior::FailApi },
        ]);
        let plan = TargetPlan::explicit(vec!["us-east-1".into(), "us-west-2".into()]);
        let report = run_scan(&plan, &rules, |_| async { Ok(()) }, None).await.unwrap();

        assert_eq!(report.findings.len(), 2);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.classification == FailureClassification::Partial));
    }
}

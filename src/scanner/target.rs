//! Per-target rule execution and outcome classification.

use futures::{stream, StreamExt};
use thiserror::Error;
use tracing::{debug, warn};

use super::{FailureClassification, TargetOrigin, MAX_RULE_CONCURRENCY};
use crate::{finding::Finding, rules::Registry};

/// Why a target as a whole is considered broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalKind {
    /// Every rule failed with a connectivity error: the target name is
    /// almost certainly invalid or the endpoint is unreachable.
    Unreachable,
    /// Every rule failed with a permission error: the credential cannot
    /// read anything here. Surfaces as the permission exit code.
    Permission,
    /// Every rule failed for mixed reasons: a systemic auth or
    /// configuration problem rather than per-rule noise.
    Systemic,
    /// The session/client for the target could not be constructed.
    Session,
}

/// Failure of a whole target, as opposed to a single rule.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FatalTargetError {
    pub kind: FatalKind,
    pub message: String,
}

/// Result of scanning one target.
#[derive(Debug)]
pub struct TargetOutcome {
    pub target: String,
    pub origin: TargetOrigin,
    pub findings: Vec<Finding>,
    pub rules_succeeded: usize,
    pub rules_failed: usize,
    pub classification: FailureClassification,
}

impl TargetOutcome {
    /// Placeholder outcome for an auto-discovered target whose scan failed
    /// fatally but did not abort the run.
    pub(super) fn fatal(target: String, origin: TargetOrigin, rules_failed: usize) -> Self {
        Self {
            target,
            origin,
            findings: Vec::new(),
            rules_succeeded: 0,
            rules_failed,
            classification: FailureClassification::Fatal,
        }
    }
}

/// Run every registered rule against one target with bounded concurrency.
///
/// A single rule's failure never aborts its siblings; the rule set always
/// runs to completion. Afterwards the aggregate is classified:
///
/// * all rules failed with connectivity errors: the target itself is
///   invalid or unreachable, [`FatalKind::Unreachable`];
/// * all rules failed for any other mix of reasons: systemic auth/config
///   problem, [`FatalKind::Systemic`];
/// * otherwise the findings of whichever rules succeeded are returned,
///   with partial failure recorded, never raised.
///
/// Every returned finding has its `target` field set to `target`; the
/// scanner, not the rule, is the authority on attribution.
pub async fn scan_target<C: Sync>(
    client: &C,
    target: &str,
    origin: TargetOrigin,
    rules: &Registry<C>,
) -> Result<TargetOutcome, FatalTargetError> {
    let concurrency = MAX_RULE_CONCURRENCY.min(rules.len()).max(1);

    let mut completed = stream::iter(rules.iter())
        .map(|rule| async move { (rule.id(), rule.evaluate(client, target).await) })
        .buffer_unordered(concurrency);

    let mut findings: Vec<Finding> = Vec::new();
    let mut rules_succeeded = 0usize;
    let mut rules_failed = 0usize;
    let mut connectivity_failures = 0usize;
    let mut permission_failures = 0usize;

    while let Some((rule_id, result)) = completed.next().await {
        match result {
            Ok(rule_findings) => {
                debug!("rule {rule_id} returned {} finding(s) in {target}", rule_findings.len());
                rules_succeeded += 1;
                findings.extend(rule_findings);
            }
            Err(err) => {
                rules_failed += 1;
                if err.is_connectivity() {
                    connectivity_failures += 1;
                }
                if err.is_permission() {
                    permission_failures += 1;
                }
                warn!("rule {rule_id} failed in {target}: {err}");
            }
        }
    }

    if rules_succeeded == 0 && rules_failed > 0 && connectivity_failures == rules_failed {
        return Err(FatalTargetError {
            kind: FatalKind::Unreachable,
            message: format!(
                "target '{target}' appears to be invalid or unreachable: all {rules_failed} \
                 rules failed with endpoint connectivity errors. Check that the target name \
                 is correct (e.g. us-east-1, eu-west-1)."
            ),
        });
    }

    if rules_succeeded == 0 && rules_failed > 0 && permission_failures == rules_failed {
        return Err(FatalTargetError {
            kind: FatalKind::Permission,
            message: format!(
                "the credential cannot read anything in target '{target}': all {rules_failed} \
                 rules failed with permission errors."
            ),
        });
    }

    if rules_succeeded == 0 && rules_failed > 0 {
        return Err(FatalTargetError {
            kind: FatalKind::Systemic,
            message: format!(
                "all {rules_failed} rules failed in target '{target}'. This indicates a \
                 configuration or permissions problem rather than individual rule noise."
            ),
        });
    }

    for finding in &mut findings {
        if finding.evidence.signals_used.is_empty() {
            // Contract violation by the rule, not by the resource.
            warn!(
                "finding {} from rule {} carries no evidence signals",
                finding.resource_id, finding.rule_id
            );
            debug_assert!(false, "finding without signals_used");
        }
        finding.target = Some(target.to_string());
    }

    let classification = if rules_failed == 0 {
        FailureClassification::None
    } else {
        FailureClassification::Partial
    };

    Ok(TargetOutcome {
        target: target.to_string(),
        origin,
        findings,
        rules_succeeded,
        rules_failed,
        classification,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use futures::future::BoxFuture;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        finding::{ConfidenceLevel, Evidence, Provider, RiskLevel},
        rules::{Rule, RuleError},
    };

    /// What a fake rule does when invoked.
    pub(crate) enum Behavior {
        /// Return this many findings, each without a target set.
        Findings(usize),
        FailConnectivity,
        FailPermission,
        FailApi,
    }

    pub(crate) struct FakeRule {
        pub id: &'static str,
        pub behavior: Behavior,
    }

    pub(crate) fn fake_finding(rule_id: &str, resource_id: &str) -> Finding {
        Finding {
            provider: Provider::Aws,
            rule_id: rule_id.to_string(),
            resource_type: "test.resource".into(),
            resource_id: resource_id.to_string(),
            target: None,
            title: "Test finding".into(),
            summary: "Synthetic finding for scanner tests".into(),
            reason: "test".into(),
            risk: RiskLevel::Low,
            confidence: ConfidenceLevel::Low,
            detected_at: Utc::now(),
            details: BTreeMap::new(),
            evidence: Evidence {
                signals_used: vec!["synthetic signal".into()],
                signals_not_checked: vec![],
                time_window: None,
            },
        }
    }

    impl Rule<()> for FakeRule {
        fn id(&self) -> &'static str {
            self.id
        }

        fn evaluate<'a>(
            &'a self,
            _client: &'a (),
            _target: &'a str,
        ) -> BoxFuture<'a, Result<Vec<Finding>, RuleError>> {
            Box::pin(async move {
                match self.behavior {
                    Behavior::Findings(n) => Ok((0..n)
                        .map(|i| fake_finding(self.id, &format!("{}-{i}", self.id)))
                        .collect()),
                    Behavior::FailConnectivity => {
                        Err(RuleError::Connectivity("no such endpoint".into()))
                    }
                    Behavior::FailPermission => {
                        Err(RuleError::PermissionDenied("not authorized".into()))
                    }
                    Behavior::FailApi => Err(RuleError::Api("throttled".into())),
                }
            })
        }
    }

    pub(crate) fn registry(rules: Vec<FakeRule>) -> Registry<()> {
        rules.into_iter().map(|r| Box::new(r) as Box<dyn Rule<()>>).collect()
    }

    #[tokio::test]
    async fn all_connectivity_failures_are_fatal_unreachable() {
        let rules = registry(vec![
            FakeRule { id: "a", behavior: Behavior::FailConnectivity },
            FakeRule { id: "b", behavior: Behavior::FailConnectivity },
            FakeRule { id: "c", behavior: Behavior::FailConnectivity },
        ]);
        let err = scan_target(&(), "mars-east-1", TargetOrigin::Explicit, &rules)
            .await
            .expect_err("should be fatal");
        assert_eq!(err.kind, FatalKind::Unreachable);
    }

    #[tokio::test]
    async fn one_success_prevents_fatality() {
        let rules = registry(vec![
            FakeRule { id: "a", behavior: Behavior::FailConnectivity },
            FakeRule { id: "b", behavior: Behavior::Findings(1) },
            FakeRule { id: "c", behavior: Behavior::FailConnectivity },
        ]);
        let outcome = scan_target(&(), "us-east-1", TargetOrigin::Explicit, &rules)
            .await
            .expect("partial success is not fatal");
        assert_eq!(outcome.rules_succeeded, 1);
        assert_eq!(outcome.rules_failed, 2);
        assert_eq!(outcome.classification, FailureClassification::Partial);
        assert_eq!(outcome.findings.len(), 1);
    }

    #[tokio::test]
    async fn all_permission_failures_are_fatal_permission() {
        let rules = registry(vec![
            FakeRule { id: "a", behavior: Behavior::FailPermission },
            FakeRule { id: "b", behavior: Behavior::FailPermission },
        ]);
        let err = scan_target(&(), "us-east-1", TargetOrigin::Explicit, &rules)
            .await
            .expect_err("should be fatal");
        assert_eq!(err.kind, FatalKind::Permission);
    }

    #[tokio::test]
    async fn mixed_total_failure_is_fatal_systemic() {
        let rules = registry(vec![
            FakeRule { id: "a", behavior: Behavior::FailConnectivity },
            FakeRule { id: "b", behavior: Behavior::FailApi },
        ]);
        let err = scan_target(&(), "us-east-1", TargetOrigin::Explicit, &rules)
            .await
            .expect_err("should be fatal");
        assert_eq!(err.kind, FatalKind::Systemic);
    }

    #[tokio::test]
    async fn partial_failure_keeps_exactly_the_surviving_rules_findings() {
        let rules = registry(vec![
            FakeRule { id: "a", behavior: Behavior::Findings(2) },
            FakeRule { id: "b", behavior: Behavior::FailApi },
            FakeRule { id: "c", behavior: Behavior::Findings(3) },
        ]);
        let outcome =
            scan_target(&(), "us-east-1", TargetOrigin::Explicit, &rules).await.unwrap();
        assert_eq!(outcome.findings.len(), 5);
        assert!(outcome.findings.iter().all(|f| f.rule_id == "a" || f.rule_id == "c"));
        assert_eq!(outcome.rules_succeeded, 2);
        assert_eq!(outcome.rules_failed, 1);
    }

    #[tokio::test]
    async fn every_finding_is_attributed_to_the_scanned_target() {
        let rules = registry(vec![FakeRule { id: "a", behavior: Behavior::Findings(4) }]);
        let outcome =
            scan_target(&(), "eu-west-1", TargetOrigin::Discovered, &rules).await.unwrap();
        assert!(outcome.findings.iter().all(|f| f.target.as_deref() == Some("eu-west-1")));
        assert_eq!(outcome.classification, FailureClassification::None);
    }

    #[tokio::test]
    async fn empty_target_yields_empty_success() {
        // Zero rules is degenerate but must not divide by zero or classify
        // as fatal.
        let rules = registry(vec![]);
        let outcome =
            scan_target(&(), "us-east-1", TargetOrigin::Explicit, &rules).await.unwrap();
        assert_eq!(outcome.findings.len(), 0);
        assert_eq!(outcome.classification, FailureClassification::None);
    }
}

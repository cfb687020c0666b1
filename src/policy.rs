//! Exit-code policy: the stable CI/CD contract.
//!
//! Report-only by default: findings alone never fail a build. Callers opt
//! into gating with `--fail-on-findings` or `--fail-on-confidence`.

use crate::finding::{ConfidenceLevel, Finding};

pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_POLICY_VIOLATION: i32 = 2;
pub const EXIT_PERMISSION_ERROR: i32 = 3;

/// Map findings and gating flags to a process exit code.
///
/// Precedence:
/// 1. no findings: [`EXIT_OK`]
/// 2. `fail_on_findings`: [`EXIT_POLICY_VIOLATION`] for any finding
/// 3. `fail_on_confidence`: violation if any finding meets the threshold
/// 4. otherwise [`EXIT_OK`]
pub fn determine_exit_code(
    findings: &[Finding],
    fail_on_findings: bool,
    fail_on_confidence: Option<ConfidenceLevel>,
) -> i32 {
    if findings.is_empty() {
        return EXIT_OK;
    }

    if fail_on_findings {
        return EXIT_POLICY_VIOLATION;
    }

    if let Some(threshold) = fail_on_confidence {
        if findings.iter().any(|f| f.confidence >= threshold) {
            return EXIT_POLICY_VIOLATION;
        }
    }

    EXIT_OK
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::finding::{Evidence, Provider, RiskLevel};

    fn finding_with(confidence: ConfidenceLevel) -> Finding {
        Finding {
            provider: Provider::Aws,
            rule_id: "test.rule".into(),
            resource_type: "test".into(),
            resource_id: "r-1".into(),
            target: Some("us-east-1".into()),
            title: "t".into(),
            summary: "s".into(),
            reason: "r".into(),
            risk: RiskLevel::Low,
            confidence,
            detected_at: Utc::now(),
            details: BTreeMap::new(),
            evidence: Evidence {
                signals_used: vec!["signal".into()],
                signals_not_checked: vec![],
                time_window: None,
            },
        }
    }

    #[test]
    fn no_findings_is_ok() {
        assert_eq!(determine_exit_code(&[], false, None), EXIT_OK);
        assert_eq!(determine_exit_code(&[], true, Some(ConfidenceLevel::Low)), EXIT_OK);
    }

    #[test]
    fn report_only_by_default() {
        // Even HIGH confidence findings do not fail a build without a flag.
        let findings =
            vec![finding_with(ConfidenceLevel::High), finding_with(ConfidenceLevel::Low)];
        assert_eq!(determine_exit_code(&findings, false, None), EXIT_OK);
    }

    #[test]
    fn fail_on_findings_trips_on_a_single_low() {
        let findings = vec![finding_with(ConfidenceLevel::Low)];
        assert_eq!(determine_exit_code(&findings, true, None), EXIT_POLICY_VIOLATION);
    }

    #[test]
    fn fail_on_findings_takes_precedence_over_confidence_threshold() {
        let findings = vec![finding_with(ConfidenceLevel::Low)];
        assert_eq!(
            determine_exit_code(&findings, true, Some(ConfidenceLevel::High)),
            EXIT_POLICY_VIOLATION
        );
    }

    #[test]
    fn confidence_threshold_is_inclusive() {
        let findings = vec![finding_with(ConfidenceLevel::Medium)];
        assert_eq!(
            determine_exit_code(&findings, false, Some(ConfidenceLevel::Medium)),
            EXIT_POLICY_VIOLATION
        );
        assert_eq!(
            determine_exit_code(&findings, false, Some(ConfidenceLevel::High)),
            EXIT_OK
        );
    }

    #[test]
    fn lowering_the_threshold_never_reduces_violations() {
        // For any fixed finding set, a violation at threshold T implies a
        // violation at every threshold below T.
        let sets: Vec<Vec<Finding>> = vec![
            vec![finding_with(ConfidenceLevel::Low)],
            vec![finding_with(ConfidenceLevel::Medium)],
            vec![finding_with(ConfidenceLevel::High)],
            vec![finding_with(ConfidenceLevel::Low), finding_with(ConfidenceLevel::High)],
        ];
        let thresholds =
            [ConfidenceLevel::Low, ConfidenceLevel::Medium, ConfidenceLevel::High];
        for findings in &sets {
            for window in thresholds.windows(2) {
                let (lower, higher) = (window[0], window[1]);
                let at_higher = determine_exit_code(findings, false, Some(higher));
                let at_lower = determine_exit_code(findings, false, Some(lower));
                if at_higher == EXIT_POLICY_VIOLATION {
                    assert_eq!(at_lower, EXIT_POLICY_VIOLATION);
                }
            }
        }
    }

    #[test]
    fn mixed_confidences_checked_against_low_threshold() {
        let findings =
            vec![finding_with(ConfidenceLevel::Low), finding_with(ConfidenceLevel::Medium)];
        assert_eq!(
            determine_exit_code(&findings, false, Some(ConfidenceLevel::Low)),
            EXIT_POLICY_VIOLATION
        );
        assert_eq!(
            determine_exit_code(&findings, false, Some(ConfidenceLevel::High)),
            EXIT_OK
        );
    }
}

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use super::{Reporter, ScanSummary, REPORT_SCHEMA_VERSION};
use crate::finding::Finding;

/// Top-level JSON payload, serialized 1:1 with the published schema.
#[derive(Serialize)]
struct JsonReport<'a> {
    schema_version: &'static str,
    summary: &'a ScanSummary,
    findings: &'a [Finding],
}

impl Reporter {
    pub fn json_format<W: Write>(
        &self,
        writer: &mut W,
        findings: &[Finding],
        summary: &ScanSummary,
    ) -> Result<()> {
        let report =
            JsonReport { schema_version: REPORT_SCHEMA_VERSION, summary, findings };
        serde_json::to_writer_pretty(&mut *writer, &report)?;
        writeln!(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        finding::{ConfidenceLevel, Evidence, Provider, RiskLevel},
        reporter::styles::Styles,
        scanner::{ScanReport, SelectionMode},
    };

    fn sample_findings() -> Vec<Finding> {
        vec![Finding {
            provider: Provider::Aws,
            rule_id: "aws.ebs.unattached".into(),
            resource_type: "aws.ebs.volume".into(),
            resource_id: "vol-1".into(),
            target: Some("us-east-1".into()),
            title: "Unattached EBS volume".into(),
            summary: "EBS volume is not attached".into(),
            reason: "not attached".into(),
            risk: RiskLevel::Low,
            confidence: ConfidenceLevel::High,
            detected_at: Utc::now(),
            details: BTreeMap::new(),
            evidence: Evidence {
                signals_used: vec!["state".into()],
                signals_not_checked: vec![],
                time_window: None,
            },
        }]
    }

    #[test]
    fn json_report_carries_schema_version_summary_and_findings() {
        let findings = sample_findings();
        let report = ScanReport {
            selection_mode: SelectionMode::Auto,
            findings: findings.clone(),
            targets_scanned: vec!["us-east-1".into(), "eu-west-1".into()],
            outcomes: Vec::new(),
        };
        let summary = ScanSummary::build(&report, &findings, 2);

        let reporter = Reporter { styles: Styles::new(false) };
        let mut output = Vec::new();
        reporter.json_format(&mut output, &findings, &summary).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["schema_version"], REPORT_SCHEMA_VERSION);
        assert_eq!(value["summary"]["total_findings"], 1);
        assert_eq!(value["summary"]["target_selection_mode"], "auto");
        assert_eq!(value["summary"]["highest_confidence"], "high");
        assert_eq!(value["summary"]["high_confidence_findings"], 1);
        assert_eq!(value["summary"]["ignored_by_tag_policy"], 2);
        assert!(value["summary"].get("incomplete_targets").is_none());
        assert_eq!(value["findings"].as_array().unwrap().len(), 1);
        assert_eq!(value["findings"][0]["rule_id"], "aws.ebs.unattached");
    }

    #[test]
    fn summary_counts_group_by_provider_risk_and_confidence() {
        let findings = sample_findings();
        let report = ScanReport {
            selection_mode: SelectionMode::Explicit,
            findings: findings.clone(),
            targets_scanned: vec!["us-east-1".into()],
            outcomes: Vec::new(),
        };
        let summary = ScanSummary::build(&report, &findings, 0);
        assert_eq!(summary.by_provider.get("aws"), Some(&1));
        assert_eq!(summary.by_risk.get("low"), Some(&1));
        assert_eq!(summary.by_confidence.get("high"), Some(&1));
        assert!(summary.ignored_by_tag_policy.is_none());
    }
}

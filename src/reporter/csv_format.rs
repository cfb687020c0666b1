use std::io::Write;

use anyhow::Result;

use super::Reporter;
use crate::finding::Finding;

/// Flat top-level fields only; the details bag and evidence stay in the
/// JSON report.
const CSV_FIELDS: &[&str] = &[
    "provider",
    "rule_id",
    "resource_type",
    "resource_id",
    "target",
    "title",
    "summary",
    "reason",
    "risk",
    "confidence",
    "detected_at",
];

impl Reporter {
    pub fn csv_format<W: Write>(&self, writer: &mut W, findings: &[Finding]) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(CSV_FIELDS)?;
        for f in findings {
            csv_writer.write_record([
                f.provider.to_string().as_str(),
                f.rule_id.as_str(),
                f.resource_type.as_str(),
                f.resource_id.as_str(),
                f.target.as_deref().unwrap_or(""),
                f.title.as_str(),
                f.summary.as_str(),
                f.reason.as_str(),
                f.risk.to_string().as_str(),
                f.confidence.to_string().as_str(),
                f.detected_at.to_rfc3339().as_str(),
            ])?;
        }
        csv_writer.flush()?;
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
    };

    fn finding(resource_id: &str) -> Finding {
        Finding {
            provider: Provider::Azure,
            rule_id: "azure.public_ip.unused".into(),
            resource_type: "azure.public_ip".into(),
            resource_id: resource_id.into(),
            target: Some("sub-1".into()),
            title: "Unused Azure Public IP".into(),
            summary: "Public IP is not attached".into(),
            reason: "no ip configuration".into(),
            risk: RiskLevel::Low,
            confidence: ConfidenceLevel::Medium,
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
    fn csv_has_header_and_one_row_per_finding() {
        let reporter = Reporter { styles: Styles::new(false) };
        let mut output = Vec::new();
        reporter.csv_format(&mut output, &[finding("ip-1"), finding("ip-2")]).unwrap();
        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.trim_end().lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("provider,rule_id,resource_type"));
        assert!(lines[1].contains("ip-1"));
        assert!(lines[2].contains("ip-2"));
    }

    #[test]
    fn missing_target_serializes_as_empty_cell() {
        let mut f = finding("ip-3");
        f.target = None;
        let reporter = Reporter { styles: Styles::new(false) };
        let mut output = Vec::new();
        reporter.csv_format(&mut output, &[f]).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.lines().nth(1).unwrap().contains(",,"));
    }
}

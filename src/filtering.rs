//! Tag-based finding suppression.
//!
//! Findings whose resource tags match an ignore rule are partitioned out of
//! the report before the exit policy runs; the ignored count stays visible
//! in the summary so suppression is never silent.

use std::collections::BTreeMap;

use anyhow::{bail, Result};

use crate::finding::Finding;

/// Suppress findings whose resource carries this tag. A rule without a
/// value matches any value of the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreTagRule {
    pub key: String,
    pub value: Option<String>,
}

impl IgnoreTagRule {
    /// Parse a CLI `KEY` or `KEY:VALUE` specifier.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            bail!("empty --ignore-tag specifier");
        }
        match spec.split_once(':') {
            Some((key, value)) => {
                if key.is_empty() {
                    bail!("--ignore-tag specifier '{spec}' has an empty key");
                }
                Ok(Self { key: key.to_string(), value: Some(value.to_string()) })
            }
            None => Ok(Self { key: spec.to_string(), value: None }),
        }
    }

    fn matches(&self, tags: &BTreeMap<String, String>) -> bool {
        match tags.get(&self.key) {
            None => false,
            Some(_) if self.value.is_none() => true,
            Some(actual) => self.value.as_deref() == Some(actual.as_str()),
        }
    }
}

#[derive(Debug)]
pub struct TagFilterResult {
    pub kept: Vec<Finding>,
    pub ignored: Vec<Finding>,
}

/// Partition findings into kept and ignored according to the ignore rules.
pub fn filter_findings_by_tags(
    findings: Vec<Finding>,
    ignore_rules: &[IgnoreTagRule],
) -> TagFilterResult {
    if ignore_rules.is_empty() {
        return TagFilterResult { kept: findings, ignored: Vec::new() };
    }

    let mut kept = Vec::new();
    let mut ignored = Vec::new();

    for finding in findings {
        let tags = finding.tags();
        if ignore_rules.iter().any(|rule| rule.matches(&tags)) {
            ignored.push(finding);
        } else {
            kept.push(finding);
        }
    }

    TagFilterResult { kept, ignored }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::finding::{ConfidenceLevel, Evidence, Provider, RiskLevel};

    fn base_finding(resource_id: &str) -> Finding {
        Finding {
            provider: Provider::Aws,
            rule_id: "test.rule".into(),
            resource_type: "test".into(),
            resource_id: resource_id.into(),
            target: Some("us-east-1".into()),
            title: "t".into(),
            summary: "s".into(),
            reason: "r".into(),
            risk: RiskLevel::Low,
            confidence: ConfidenceLevel::Low,
            detected_at: Utc::now(),
            details: BTreeMap::new(),
            evidence: Evidence {
                signals_used: vec!["signal".into()],
                signals_not_checked: vec![],
                time_window: None,
            },
        }
    }

    fn tagged_finding(tags: serde_json::Value) -> Finding {
        let mut f = base_finding("r-1");
        f.details.insert("tags".into(), tags);
        f
    }

    #[test]
    fn parse_accepts_key_only_and_key_value() {
        assert_eq!(
            IgnoreTagRule::parse("keep").unwrap(),
            IgnoreTagRule { key: "keep".into(), value: None }
        );
        assert_eq!(
            IgnoreTagRule::parse("env:prod").unwrap(),
            IgnoreTagRule { key: "env".into(), value: Some("prod".into()) }
        );
        assert!(IgnoreTagRule::parse("").is_err());
        assert!(IgnoreTagRule::parse(":prod").is_err());
    }

    #[test]
    fn key_only_rule_matches_any_value() {
        let rules = vec![IgnoreTagRule { key: "keep".into(), value: None }];
        let findings = vec![
            tagged_finding(json!([{"Key": "keep", "Value": "yes"}])),
            tagged_finding(json!([{"Key": "other", "Value": "x"}])),
        ];
        let result = filter_findings_by_tags(findings, &rules);
        assert_eq!(result.kept.len(), 1);
        assert_eq!(result.ignored.len(), 1);
    }

    #[test]
    fn key_value_rule_requires_exact_value() {
        let rules = vec![IgnoreTagRule { key: "env".into(), value: Some("prod".into()) }];
        let findings = vec![
            tagged_finding(json!({"env": "prod"})),
            tagged_finding(json!({"env": "dev"})),
        ];
        let result = filter_findings_by_tags(findings, &rules);
        assert_eq!(result.ignored.len(), 1);
        assert_eq!(result.kept.len(), 1);
        assert_eq!(result.kept[0].tags().get("env").map(String::as_str), Some("dev"));
    }

    #[test]
    fn untagged_findings_are_always_kept() {
        let rules = vec![IgnoreTagRule { key: "keep".into(), value: None }];
        let findings = vec![base_finding("r-untagged")];
        let result = filter_findings_by_tags(findings, &rules);
        assert_eq!(result.kept.len(), 1);
        assert!(result.ignored.is_empty());
    }

    #[test]
    fn no_rules_keeps_everything() {
        let findings = vec![tagged_finding(json!({"env": "prod"}))];
        let result = filter_findings_by_tags(findings, &[]);
        assert_eq!(result.kept.len(), 1);
        assert!(result.ignored.is_empty());
    }
}

//! CloudWatch log groups that never expire.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;

use crate::{
    aws::{classify_sdk_error, AwsTargetContext},
    finding::{ConfidenceLevel, Evidence, Finding, Provider, RiskLevel},
    rules::{Rule, RuleError},
};

pub struct CloudwatchInfiniteRetention;

impl Rule<AwsTargetContext> for CloudwatchInfiniteRetention {
    fn id(&self) -> &'static str {
        "aws.cloudwatch.logs.infinite_retention"
    }

    fn evaluate<'a>(
        &'a self,
        client: &'a AwsTargetContext,
        target: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Finding>, RuleError>> {
        Box::pin(find_infinite_retention_groups(client, target))
    }
}

/// A missing retention policy means the logs accumulate forever. Ingestion
/// activity is deliberately not inferred; compliance may require keeping
/// them, so this is a review prompt, nothing more.
///
/// IAM: logs:DescribeLogGroups
async fn find_infinite_retention_groups(
    ctx: &AwsTargetContext,
    region: &str,
) -> Result<Vec<Finding>, RuleError> {
    let now = Utc::now();
    let mut findings = Vec::new();

    let mut pages = ctx.logs.describe_log_groups().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|err| classify_sdk_error("DescribeLogGroups", err))?;
        for group in page.log_groups() {
            if group.retention_in_days().is_some() {
                continue;
            }

            let mut details = BTreeMap::new();
            if let Some(bytes) = group.stored_bytes() {
                details.insert("stored_bytes".to_string(), json!(bytes));
            }
            details.insert("retention_days".to_string(), serde_json::Value::Null);

            findings.push(Finding {
                provider: Provider::Aws,
                rule_id: "aws.cloudwatch.logs.infinite_retention".into(),
                resource_type: "aws.cloudwatch.log_group".into(),
                resource_id: group.log_group_name().unwrap_or_default().to_string(),
                target: Some(region.to_string()),
                title: "CloudWatch log group with infinite retention".into(),
                summary: "Log group has no retention policy configured".into(),
                reason: "Retention is not set (logs never expire)".into(),
                risk: RiskLevel::Low,
                confidence: ConfidenceLevel::Medium,
                detected_at: now,
                details,
                evidence: Evidence {
                    signals_used: vec![
                        "Log group has no retention policy configured (never expires)".into(),
                    ],
                    signals_not_checked: vec![
                        "Recent ingestion activity".into(),
                        "Application-level usage".into(),
                        "Compliance retention requirements".into(),
                        "Future expected logs".into(),
                    ],
                    time_window: None,
                },
            });
        }
    }

    Ok(findings)
}

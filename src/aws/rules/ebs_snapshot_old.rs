//! Account-owned EBS snapshots past the configured age threshold.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;

use crate::{
    aws::{classify_sdk_error, tags_to_json, to_chrono, AwsTargetContext},
    finding::{ConfidenceLevel, Evidence, Finding, Provider, RiskLevel},
    rules::{Rule, RuleError},
};

pub struct EbsSnapshotOld;

impl Rule<AwsTargetContext> for EbsSnapshotOld {
    fn id(&self) -> &'static str {
        "aws.ebs.snapshot.old"
    }

    fn evaluate<'a>(
        &'a self,
        client: &'a AwsTargetContext,
        target: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Finding>, RuleError>> {
        Box::pin(find_old_snapshots(client, target))
    }
}

/// Snapshot age is the only signal checked; AMI linkage is not, which keeps
/// confidence at medium regardless of age.
///
/// IAM: ec2:DescribeSnapshots
async fn find_old_snapshots(
    ctx: &AwsTargetContext,
    region: &str,
) -> Result<Vec<Finding>, RuleError> {
    let threshold_days = ctx.thresholds.snapshot_age_days;
    let now = Utc::now();
    let mut findings = Vec::new();

    let mut pages = ctx.ec2.describe_snapshots().owner_ids("self").into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|err| classify_sdk_error("DescribeSnapshots", err))?;
        for snapshot in page.snapshots() {
            let Some(started) = snapshot.start_time().and_then(to_chrono) else {
                continue;
            };
            let age_days = (now - started).num_days();
            if age_days < threshold_days {
                continue;
            }

            let mut details = BTreeMap::new();
            details.insert("start_time".to_string(), json!(started.to_rfc3339()));
            details.insert("age_days".to_string(), json!(age_days));
            if let Some(volume_id) = snapshot.volume_id() {
                details.insert("volume_id".to_string(), json!(volume_id));
            }
            details.insert("tags".to_string(), tags_to_json(snapshot.tags()));

            findings.push(Finding {
                provider: Provider::Aws,
                rule_id: "aws.ebs.snapshot.old".into(),
                resource_type: "aws.ebs.snapshot".into(),
                resource_id: snapshot.snapshot_id().unwrap_or_default().to_string(),
                target: Some(region.to_string()),
                title: "Old EBS snapshot".into(),
                summary: format!("EBS snapshot older than {threshold_days} days"),
                reason: "Snapshot exceeds configured age threshold".into(),
                risk: RiskLevel::Low,
                confidence: ConfidenceLevel::Medium,
                detected_at: now,
                details,
                evidence: Evidence {
                    signals_used: vec![format!(
                        "Snapshot age is {age_days} days, exceeding threshold of \
                         {threshold_days} days"
                    )],
                    signals_not_checked: vec![
                        "AMI linkage / usage".into(),
                        "Application-level usage".into(),
                        "Disaster recovery intent".into(),
                        "Manual operational workflows".into(),
                    ],
                    time_window: Some(format!("{threshold_days} days")),
                },
            });
        }
    }

    Ok(findings)
}

//! EBS volumes not attached to any instance.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;

use crate::{
    aws::{classify_sdk_error, tags_to_json, to_chrono, AwsTargetContext},
    finding::{ConfidenceLevel, Evidence, Finding, Provider, RiskLevel},
    rules::{Rule, RuleError},
};

pub struct EbsUnattached;

impl Rule<AwsTargetContext> for EbsUnattached {
    fn id(&self) -> &'static str {
        "aws.ebs.unattached"
    }

    fn evaluate<'a>(
        &'a self,
        client: &'a AwsTargetContext,
        target: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Finding>, RuleError>> {
        Box::pin(find_unattached_volumes(client, target))
    }
}

/// Flag every volume whose state is not `in-use`.
///
/// Review-only signal: attachment state alone says nothing about disaster
/// recovery intent or planned reattachment, so confidence stays medium.
///
/// IAM: ec2:DescribeVolumes
async fn find_unattached_volumes(
    ctx: &AwsTargetContext,
    region: &str,
) -> Result<Vec<Finding>, RuleError> {
    let mut findings = Vec::new();
    let now = Utc::now();

    let mut pages = ctx.ec2.describe_volumes().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|err| classify_sdk_error("DescribeVolumes", err))?;
        for volume in page.volumes() {
            if matches!(volume.state(), Some(aws_sdk_ec2::types::VolumeState::InUse)) {
                continue;
            }

            let mut details = BTreeMap::new();
            if let Some(size) = volume.size() {
                details.insert("size_gb".to_string(), json!(size));
            }
            if let Some(az) = volume.availability_zone() {
                details.insert("availability_zone".to_string(), json!(az));
            }
            if let Some(state) = volume.state() {
                details.insert("state".to_string(), json!(state.as_str()));
            }
            if let Some(created) = volume.create_time().and_then(to_chrono) {
                details.insert("create_time".to_string(), json!(created.to_rfc3339()));
            }
            details.insert("tags".to_string(), tags_to_json(volume.tags()));

            findings.push(Finding {
                provider: Provider::Aws,
                rule_id: "aws.ebs.unattached".into(),
                resource_type: "aws.ebs.volume".into(),
                resource_id: volume.volume_id().unwrap_or_default().to_string(),
                target: Some(region.to_string()),
                title: "Unattached EBS volume".into(),
                summary: "EBS volume is not attached to any EC2 instance".into(),
                reason: "Volume is not currently attached at the provider level".into(),
                risk: RiskLevel::Low,
                confidence: ConfidenceLevel::Medium,
                detected_at: now,
                details,
                evidence: Evidence {
                    signals_used: vec![
                        "Volume state is not 'in-use' (not attached to any EC2 instance)".into(),
                    ],
                    signals_not_checked: vec![
                        "Application-level usage".into(),
                        "Disaster recovery intent".into(),
                        "Manual operational workflows".into(),
                        "Future planned attachments".into(),
                    ],
                    time_window: None,
                },
            });
        }
    }

    Ok(findings)
}

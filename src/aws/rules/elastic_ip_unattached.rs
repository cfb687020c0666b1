//! Elastic IPs allocated but not associated with anything.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;

use crate::{
    aws::{classify_sdk_error, tags_to_json, AwsTargetContext},
    finding::{ConfidenceLevel, Evidence, Finding, Provider, RiskLevel},
    rules::{Rule, RuleError},
};

pub struct ElasticIpUnattached;

impl Rule<AwsTargetContext> for ElasticIpUnattached {
    fn id(&self) -> &'static str {
        "aws.ec2.elastic_ip.unattached"
    }

    fn evaluate<'a>(
        &'a self,
        client: &'a AwsTargetContext,
        target: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Finding>, RuleError>> {
        Box::pin(find_unattached_addresses(client, target))
    }
}

/// An address without an association id is not attached to any instance or
/// network interface and bills hourly. The association state is
/// deterministic, hence high confidence; allocation age is not exposed by
/// the API and is disclosed as unchecked.
///
/// IAM: ec2:DescribeAddresses
async fn find_unattached_addresses(
    ctx: &AwsTargetContext,
    region: &str,
) -> Result<Vec<Finding>, RuleError> {
    let now = Utc::now();
    let mut findings = Vec::new();

    // DescribeAddresses has no paginator; every address arrives in one call.
    let output = ctx
        .ec2
        .describe_addresses()
        .send()
        .await
        .map_err(|err| classify_sdk_error("DescribeAddresses", err))?;

    for address in output.addresses() {
        if address.association_id().is_some() {
            continue;
        }

        let domain = address.domain().map(|d| d.as_str().to_string()).unwrap_or_else(|| "vpc".into());
        let is_classic = domain == "standard";

        let mut signals_used = vec![
            "Elastic IP is not associated with any instance or network interface".to_string(),
        ];
        if is_classic {
            signals_used.push(
                "EC2-Classic is deprecated; unattached Classic EIPs are almost always legacy \
                 leftovers"
                    .to_string(),
            );
        }

        let mut details = BTreeMap::new();
        if let Some(ip) = address.public_ip() {
            details.insert("public_ip".to_string(), json!(ip));
        }
        details.insert("domain".to_string(), json!(domain));
        details.insert("is_classic".to_string(), json!(is_classic));
        if !address.tags().is_empty() {
            details.insert("tags".to_string(), tags_to_json(address.tags()));
        }

        let resource_id = address
            .allocation_id()
            .or(address.public_ip())
            .unwrap_or_default()
            .to_string();

        findings.push(Finding {
            provider: Provider::Aws,
            rule_id: "aws.ec2.elastic_ip.unattached".into(),
            resource_type: "aws.ec2.elastic_ip".into(),
            resource_id,
            target: Some(region.to_string()),
            title: "Unattached Elastic IP (Review Recommended)".into(),
            summary: "Elastic IP is currently unattached and incurs hourly charges".into(),
            reason: "Elastic IP has no association, incurring charges".into(),
            risk: RiskLevel::Low,
            confidence: ConfidenceLevel::High,
            detected_at: now,
            details,
            evidence: Evidence {
                signals_used,
                signals_not_checked: vec![
                    "Unattached duration (EC2 does not expose a detach timestamp)".into(),
                    "Allocation age (EC2 does not expose an allocation timestamp)".into(),
                    "Previous attachment history".into(),
                    "Future planned attachments".into(),
                    "Disaster recovery intent".into(),
                ],
                time_window: None,
            },
        });
    }

    Ok(findings)
}

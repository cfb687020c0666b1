//! Detached network interfaces left behind by torn-down infrastructure.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;

use crate::{
    aws::{classify_sdk_error, tags_to_json, AwsTargetContext},
    finding::{ConfidenceLevel, Evidence, Finding, Provider, RiskLevel},
    rules::{Rule, RuleError},
};

/// Interface types owned by AWS infrastructure rather than the user. A
/// detached one of these is not actionable waste.
const INFRASTRUCTURE_INTERFACE_TYPES: &[&str] = &[
    "nat_gateway",
    "natGateway",
    "load_balancer",
    "gateway_load_balancer",
    "gateway_load_balancer_endpoint",
    "vpc_endpoint",
];

fn is_infrastructure_interface(interface_type: &str) -> bool {
    INFRASTRUCTURE_INTERFACE_TYPES.contains(&interface_type)
}

pub struct EniDetached;

impl Rule<AwsTargetContext> for EniDetached {
    fn id(&self) -> &'static str {
        "aws.ec2.eni.detached"
    }

    fn evaluate<'a>(
        &'a self,
        client: &'a AwsTargetContext,
        target: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Finding>, RuleError>> {
        Box::pin(find_detached_enis(client, target))
    }
}

/// Flag ENIs in the `available` state, excluding AWS-infrastructure
/// interface types. Requester-managed ENIs (Lambda, ECS, RDS) are included:
/// they are user resources and a common source of leftover charges.
///
/// EC2 does not expose creation or detach timestamps for ENIs, so no age
/// threshold can honestly be applied; the evidence says so.
///
/// IAM: ec2:DescribeNetworkInterfaces
async fn find_detached_enis(
    ctx: &AwsTargetContext,
    region: &str,
) -> Result<Vec<Finding>, RuleError> {
    let now = Utc::now();
    let mut findings = Vec::new();

    let mut pages = ctx.ec2.describe_network_interfaces().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|err| classify_sdk_error("DescribeNetworkInterfaces", err))?;
        for eni in page.network_interfaces() {
            if eni.status().map(|s| s.as_str()) != Some("available") {
                continue;
            }
            let interface_type =
                eni.interface_type().map(|t| t.as_str().to_string()).unwrap_or_default();
            if is_infrastructure_interface(&interface_type) {
                continue;
            }

            let requester_managed = eni.requester_managed().unwrap_or(false);
            let tags = eni.tag_set();

            let mut signals_used = vec![
                "ENI status is 'available' (currently detached)".to_string(),
            ];
            if requester_managed {
                signals_used.push(
                    "ENI is requester-managed (created by an AWS service such as Lambda/ECS)"
                        .to_string(),
                );
            }
            if tags.is_empty() {
                signals_used.push("ENI has no tags (ownership unclear)".to_string());
            }

            let mut details = BTreeMap::new();
            details.insert("status".to_string(), json!("available"));
            details.insert("interface_type".to_string(), json!(interface_type));
            details.insert("requester_managed".to_string(), json!(requester_managed));
            if let Some(vpc_id) = eni.vpc_id() {
                details.insert("vpc_id".to_string(), json!(vpc_id));
            }
            if let Some(subnet_id) = eni.subnet_id() {
                details.insert("subnet_id".to_string(), json!(subnet_id));
            }
            if let Some(az) = eni.availability_zone() {
                details.insert("availability_zone".to_string(), json!(az));
            }
            if let Some(description) = eni.description() {
                if !description.is_empty() {
                    details.insert("description".to_string(), json!(description));
                }
            }
            if let Some(ip) =
                eni.private_ip_addresses().first().and_then(|p| p.private_ip_address())
            {
                details.insert("private_ip".to_string(), json!(ip));
            }
            if !tags.is_empty() {
                details.insert("tags".to_string(), tags_to_json(tags));
            }

            findings.push(Finding {
                provider: Provider::Aws,
                rule_id: "aws.ec2.eni.detached".into(),
                resource_type: "aws.ec2.network_interface".into(),
                resource_id: eni.network_interface_id().unwrap_or_default().to_string(),
                target: Some(region.to_string()),
                title: "Detached Network Interface (Review Recommended)".into(),
                summary: "ENI is currently detached and incurs small hourly charges".into(),
                reason: "ENI is in detached state, incurring charges".into(),
                risk: RiskLevel::Low,
                confidence: ConfidenceLevel::Medium,
                detected_at: now,
                details,
                evidence: Evidence {
                    signals_used,
                    signals_not_checked: vec![
                        "Detached duration (EC2 does not expose a detach timestamp)".into(),
                        "Creation age (EC2 does not expose an ENI creation timestamp)".into(),
                        "Previous attachment history".into(),
                        "Future planned attachments".into(),
                        "Application-level usage".into(),
                    ],
                    time_window: None,
                },
            });
        }
    }

    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_interfaces_are_excluded() {
        assert!(is_infrastructure_interface("nat_gateway"));
        assert!(is_infrastructure_interface("vpc_endpoint"));
        assert!(is_infrastructure_interface("gateway_load_balancer"));
    }

    #[test]
    fn user_interfaces_are_included() {
        // Plain interfaces, including requester-managed Lambda/ECS/RDS
        // ENIs, are user resources.
        assert!(!is_infrastructure_interface("interface"));
        assert!(!is_infrastructure_interface("efa"));
        assert!(!is_infrastructure_interface(""));
    }
}

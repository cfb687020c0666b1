//! Public IP addresses not attached to any resource.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;

use crate::{
    azure::{tags_to_json, AzureTargetContext, PublicIpAddress},
    finding::{ConfidenceLevel, Evidence, Finding, Provider, RiskLevel},
    rules::{Rule, RuleError},
};

pub struct PublicIpUnused;

impl Rule<AzureTargetContext> for PublicIpUnused {
    fn id(&self) -> &'static str {
        "azure.public_ip.unused"
    }

    fn evaluate<'a>(
        &'a self,
        client: &'a AzureTargetContext,
        target: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Finding>, RuleError>> {
        Box::pin(find_unused_public_ips(client, target))
    }
}

/// A public IP without an `ipConfiguration` is associated with nothing and
/// still billed. Future association plans are not inferred.
///
/// RBAC: Microsoft.Network/publicIPAddresses/read
async fn find_unused_public_ips(
    ctx: &AzureTargetContext,
    subscription_id: &str,
) -> Result<Vec<Finding>, RuleError> {
    let now = Utc::now();
    let mut findings = Vec::new();

    let addresses: Vec<PublicIpAddress> =
        ctx.session.get_all(&ctx.network_list_url("publicIPAddresses")).await?;

    for address in addresses {
        if ctx.location_excluded(&address.location) {
            continue;
        }
        if address.properties.ip_configuration.is_some() {
            continue;
        }

        let mut details = BTreeMap::new();
        details.insert("resource_name".to_string(), json!(address.name));
        details.insert("subscription_id".to_string(), json!(subscription_id));
        details.insert("attached".to_string(), json!(false));
        if let Some(ip) = &address.properties.ip_address {
            details.insert("ip_address".to_string(), json!(ip));
        }
        details.insert("tags".to_string(), tags_to_json(&address.tags));

        findings.push(Finding {
            provider: Provider::Azure,
            rule_id: "azure.public_ip.unused".into(),
            resource_type: "azure.public_ip".into(),
            resource_id: address.id,
            target: Some(subscription_id.to_string()),
            title: "Unused Azure Public IP".into(),
            summary: "Public IP is not attached to any resource".into(),
            reason: "IP configuration is empty (not attached)".into(),
            risk: RiskLevel::Low,
            confidence: ConfidenceLevel::Medium,
            detected_at: now,
            details,
            evidence: Evidence {
                signals_used: vec![
                    "IP configuration is empty (not attached to any resource)".into(),
                ],
                signals_not_checked: vec![
                    "Planned future association".into(),
                    "IaC-managed intent".into(),
                    "Application-level usage".into(),
                    "Disaster recovery or backup planning".into(),
                ],
                time_window: None,
            },
        });
    }

    Ok(findings)
}

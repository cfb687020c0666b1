//! Managed disks not attached to any VM.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;

use crate::{
    azure::{tags_to_json, AzureTargetContext, ManagedDisk},
    finding::{ConfidenceLevel, Evidence, Finding, Provider, RiskLevel},
    rules::{Rule, RuleError},
};

pub struct DiskUnattached;

impl Rule<AzureTargetContext> for DiskUnattached {
    fn id(&self) -> &'static str {
        "azure.disk.unattached"
    }

    fn evaluate<'a>(
        &'a self,
        client: &'a AzureTargetContext,
        target: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Finding>, RuleError>> {
        Box::pin(find_unattached_disks(client, target))
    }
}

/// Attachment state plus a minimum age. A freshly created disk is likely
/// mid-provisioning and is not flagged.
///
/// RBAC: Microsoft.Compute/disks/read
async fn find_unattached_disks(
    ctx: &AzureTargetContext,
    subscription_id: &str,
) -> Result<Vec<Finding>, RuleError> {
    let min_age_days = ctx.thresholds.disk_age_days;
    let now = Utc::now();
    let mut findings = Vec::new();

    let disks: Vec<ManagedDisk> = ctx.session.get_all(&ctx.compute_list_url("disks")).await?;

    for disk in disks {
        if ctx.location_excluded(&disk.location) {
            continue;
        }
        if disk.managed_by.is_some() {
            continue;
        }
        let Some(created) = disk.properties.time_created else {
            continue;
        };
        let age_days = (now - created).num_days();
        if age_days < min_age_days {
            continue;
        }

        let mut details = BTreeMap::new();
        details.insert("resource_name".to_string(), json!(disk.name));
        details.insert("subscription_id".to_string(), json!(subscription_id));
        details.insert("managed_by".to_string(), serde_json::Value::Null);
        details.insert("age_days".to_string(), json!(age_days));
        if let Some(sku) = disk.sku.as_ref().and_then(|s| s.name.as_deref()) {
            details.insert("sku".to_string(), json!(sku));
        }
        if let Some(size) = disk.properties.disk_size_gb {
            details.insert("size_gb".to_string(), json!(size));
        }
        details.insert("tags".to_string(), tags_to_json(&disk.tags));

        findings.push(Finding {
            provider: Provider::Azure,
            rule_id: "azure.disk.unattached".into(),
            resource_type: "azure.managed_disk".into(),
            resource_id: disk.id,
            target: Some(subscription_id.to_string()),
            title: "Unattached Azure managed disk".into(),
            summary: format!("Disk not attached to any VM for {age_days} days"),
            reason: "Disk has no VM attachment and exceeds age threshold".into(),
            risk: RiskLevel::Low,
            confidence: ConfidenceLevel::Medium,
            detected_at: now,
            details,
            evidence: Evidence {
                signals_used: vec![
                    "Disk managedBy is empty (not attached to any VM)".into(),
                    format!("Disk age = {age_days} days"),
                ],
                signals_not_checked: vec![
                    "Planned future VM attachment".into(),
                    "IaC-managed intent".into(),
                    "Application-level usage".into(),
                    "Disaster recovery or backup planning".into(),
                ],
                time_window: Some(format!("{min_age_days}+ days")),
            },
        });
    }

    Ok(findings)
}

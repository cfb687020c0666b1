//! Untagged Azure disks and snapshots.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;

use crate::{
    azure::{AzureTargetContext, ManagedDisk, ManagedSnapshot},
    finding::{ConfidenceLevel, Evidence, Finding, Provider, RiskLevel},
    rules::{Rule, RuleError},
};

pub struct UntaggedResources;

impl Rule<AzureTargetContext> for UntaggedResources {
    fn id(&self) -> &'static str {
        "azure.resource.untagged"
    }

    fn evaluate<'a>(
        &'a self,
        client: &'a AzureTargetContext,
        target: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Finding>, RuleError>> {
        Box::pin(find_untagged_resources(client, target))
    }
}

fn has_tags(tags: &Option<std::collections::HashMap<String, String>>) -> bool {
    tags.as_ref().map(|t| !t.is_empty()).unwrap_or(false)
}

/// Only the presence of tags is checked. An untagged but attached disk is
/// lower confidence than an untagged orphan; brand-new snapshots are
/// skipped entirely.
///
/// RBAC: Microsoft.Compute/disks/read, Microsoft.Compute/snapshots/read
async fn find_untagged_resources(
    ctx: &AzureTargetContext,
    subscription_id: &str,
) -> Result<Vec<Finding>, RuleError> {
    let min_snapshot_age_days = ctx.thresholds.untagged_min_age_days;
    let now = Utc::now();
    let mut findings = Vec::new();

    let disks: Vec<ManagedDisk> = ctx.session.get_all(&ctx.compute_list_url("disks")).await?;
    for disk in disks {
        if ctx.location_excluded(&disk.location) || has_tags(&disk.tags) {
            continue;
        }

        let confidence = if disk.managed_by.is_none() {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };

        let mut details = BTreeMap::new();
        details.insert("resource_name".to_string(), json!(disk.name));
        details.insert("subscription_id".to_string(), json!(subscription_id));
        details.insert("tags_present".to_string(), json!(false));
        details.insert(
            "managed_by".to_string(),
            disk.managed_by.as_deref().map(|m| json!(m)).unwrap_or(serde_json::Value::Null),
        );

        findings.push(Finding {
            provider: Provider::Azure,
            rule_id: "azure.resource.untagged".into(),
            resource_type: "azure.managed_disk".into(),
            resource_id: disk.id,
            target: Some(subscription_id.to_string()),
            title: "Untagged Azure managed disk".into(),
            summary: "Disk has no tags".into(),
            reason: "No tags found on resource".into(),
            risk: RiskLevel::Low,
            confidence,
            detected_at: now,
            details,
            evidence: Evidence {
                signals_used: vec!["No tags found on disk".into()],
                signals_not_checked: vec![
                    "Planned VM attachment".into(),
                    "IaC-managed intent".into(),
                    "Application-level usage".into(),
                    "Disaster recovery or backup planning".into(),
                ],
                time_window: None,
            },
        });
    }

    let snapshots: Vec<ManagedSnapshot> =
        ctx.session.get_all(&ctx.compute_list_url("snapshots")).await?;
    for snapshot in snapshots {
        if ctx.location_excluded(&snapshot.location) || has_tags(&snapshot.tags) {
            continue;
        }
        let Some(created) = snapshot.properties.time_created else {
            continue;
        };
        let age_days = (now - created).num_days();
        if age_days < min_snapshot_age_days {
            continue;
        }

        let mut details = BTreeMap::new();
        details.insert("resource_name".to_string(), json!(snapshot.name));
        details.insert("subscription_id".to_string(), json!(subscription_id));
        details.insert("tags_present".to_string(), json!(false));
        details.insert("age_days".to_string(), json!(age_days));

        findings.push(Finding {
            provider: Provider::Azure,
            rule_id: "azure.resource.untagged".into(),
            resource_type: "azure.snapshot".into(),
            resource_id: snapshot.id,
            target: Some(subscription_id.to_string()),
            title: "Untagged Azure snapshot".into(),
            summary: "Snapshot has no tags".into(),
            reason: "No tags found on resource".into(),
            risk: RiskLevel::Low,
            confidence: ConfidenceLevel::Low,
            detected_at: now,
            details,
            evidence: Evidence {
                signals_used: vec![format!("No tags found on snapshot, age {age_days} days")],
                signals_not_checked: vec![
                    "Disk usage by applications".into(),
                    "IaC-managed ownership".into(),
                    "Disaster recovery or backup planning".into(),
                    "Future planned usage".into(),
                ],
                time_window: Some(format!(">={min_snapshot_age_days} days")),
            },
        });
    }

    Ok(findings)
}

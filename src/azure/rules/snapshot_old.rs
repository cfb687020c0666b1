//! Managed snapshots past the configured age threshold.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;

use crate::{
    azure::{tags_to_json, AzureTargetContext, ManagedSnapshot},
    finding::{ConfidenceLevel, Evidence, Finding, Provider, RiskLevel},
    rules::{Rule, RuleError},
};

pub struct SnapshotOld;

impl Rule<AzureTargetContext> for SnapshotOld {
    fn id(&self) -> &'static str {
        "azure.snapshot.old"
    }

    fn evaluate<'a>(
        &'a self,
        client: &'a AzureTargetContext,
        target: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Finding>, RuleError>> {
        Box::pin(find_old_snapshots(client, target))
    }
}

/// Age is the only signal; usage and ownership are not inferred.
///
/// RBAC: Microsoft.Compute/snapshots/read
async fn find_old_snapshots(
    ctx: &AzureTargetContext,
    subscription_id: &str,
) -> Result<Vec<Finding>, RuleError> {
    let threshold_days = ctx.thresholds.snapshot_age_days;
    let now = Utc::now();
    let mut findings = Vec::new();

    let snapshots: Vec<ManagedSnapshot> =
        ctx.session.get_all(&ctx.compute_list_url("snapshots")).await?;

    for snapshot in snapshots {
        if ctx.location_excluded(&snapshot.location) {
            continue;
        }
        let Some(created) = snapshot.properties.time_created else {
            continue;
        };
        let age_days = (now - created).num_days();
        if age_days < threshold_days {
            continue;
        }

        let mut details = BTreeMap::new();
        details.insert("resource_name".to_string(), json!(snapshot.name));
        details.insert("subscription_id".to_string(), json!(subscription_id));
        details.insert("age_days".to_string(), json!(age_days));
        if let Some(size) = snapshot.properties.disk_size_gb {
            details.insert("disk_size_gb".to_string(), json!(size));
        }
        if let Some(sku) = snapshot.sku.as_ref().and_then(|s| s.name.as_deref()) {
            details.insert("sku".to_string(), json!(sku));
        }
        details.insert("tags".to_string(), tags_to_json(&snapshot.tags));

        findings.push(Finding {
            provider: Provider::Azure,
            rule_id: "azure.snapshot.old".into(),
            resource_type: "azure.snapshot".into(),
            resource_id: snapshot.id,
            target: Some(subscription_id.to_string()),
            title: "Old Azure managed snapshot".into(),
            summary: format!("Snapshot has existed for {age_days} days"),
            reason: "Snapshot age exceeds configured threshold".into(),
            risk: RiskLevel::Low,
            confidence: ConfidenceLevel::Medium,
            detected_at: now,
            details,
            evidence: Evidence {
                signals_used: vec![format!("Snapshot age is {age_days} days")],
                signals_not_checked: vec![
                    "Disk usage by applications".into(),
                    "IaC-managed ownership".into(),
                    "Disaster recovery or backup intent".into(),
                    "Future planned usage".into(),
                ],
                time_window: Some(format!("{threshold_days}+ days")),
            },
        });
    }

    Ok(findings)
}

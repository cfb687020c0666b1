//! Untagged EBS volumes, S3 buckets, and CloudWatch log groups.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use crate::{
    aws::{classify_sdk_error, AwsTargetContext},
    finding::{ConfidenceLevel, Evidence, Finding, Provider, RiskLevel},
    rules::{Rule, RuleError},
};

pub struct UntaggedResources;

impl Rule<AwsTargetContext> for UntaggedResources {
    fn id(&self) -> &'static str {
        "aws.resource.untagged"
    }

    fn evaluate<'a>(
        &'a self,
        client: &'a AwsTargetContext,
        target: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Finding>, RuleError>> {
        Box::pin(find_untagged_resources(client, target))
    }
}

/// Absence of tags is the only signal; ownership intent is not inferred.
///
/// IAM: ec2:DescribeVolumes, s3:ListAllMyBuckets, s3:GetBucketTagging,
/// logs:DescribeLogGroups, logs:ListTagsLogGroup
async fn find_untagged_resources(
    ctx: &AwsTargetContext,
    region: &str,
) -> Result<Vec<Finding>, RuleError> {
    let now = Utc::now();
    let mut findings = Vec::new();

    // EBS volumes
    let mut pages = ctx.ec2.describe_volumes().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|err| classify_sdk_error("DescribeVolumes", err))?;
        for volume in page.volumes() {
            if !volume.tags().is_empty() {
                continue;
            }
            let mut details = BTreeMap::new();
            if let Some(az) = volume.availability_zone() {
                details.insert("availability_zone".to_string(), json!(az));
            }
            if let Some(size) = volume.size() {
                details.insert("size_gb".to_string(), json!(size));
            }
            findings.push(untagged_finding(
                "ebs_volume",
                volume.volume_id().unwrap_or_default(),
                Some(region),
                "Untagged EBS volume",
                "EBS volume has no tags",
                details,
                now,
            ));
        }
    }

    // S3 buckets are a global listing; the scanner attributes them to the
    // region that observed them.
    let buckets = ctx
        .s3
        .list_buckets()
        .send()
        .await
        .map_err(|err| classify_sdk_error("ListBuckets", err))?;
    for bucket in buckets.buckets() {
        let Some(name) = bucket.name() else { continue };
        let tag_set = match ctx.s3.get_bucket_tagging().bucket(name).send().await {
            Ok(output) => output.tag_set().to_vec(),
            // NoSuchTagSet, redirects for out-of-region buckets: treat all
            // of these as "no tags visible".
            Err(err) => {
                debug!("GetBucketTagging failed for {name}: {err}");
                Vec::new()
            }
        };
        if !tag_set.is_empty() {
            continue;
        }
        findings.push(untagged_finding(
            "s3_bucket",
            name,
            None,
            "Untagged S3 bucket",
            "S3 bucket has no tags",
            BTreeMap::new(),
            now,
        ));
    }

    // CloudWatch log groups: tags require a separate call per group.
    let mut pages = ctx.logs.describe_log_groups().into_paginator().send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|err| classify_sdk_error("DescribeLogGroups", err))?;
        for group in page.log_groups() {
            let Some(name) = group.log_group_name() else { continue };
            let tags = match ctx.logs.list_tags_log_group().log_group_name(name).send().await {
                Ok(output) => output.tags().cloned().unwrap_or_default(),
                Err(err) => {
                    debug!("ListTagsLogGroup failed for {name}: {err}");
                    Default::default()
                }
            };
            if !tags.is_empty() {
                continue;
            }
            findings.push(untagged_finding(
                "cloudwatch_log_group",
                name,
                Some(region),
                "Untagged CloudWatch log group",
                "Log group has no tags",
                BTreeMap::new(),
                now,
            ));
        }
    }

    Ok(findings)
}

fn untagged_finding(
    resource_type: &str,
    resource_id: &str,
    region: Option<&str>,
    title: &str,
    summary: &str,
    details: BTreeMap<String, serde_json::Value>,
    now: chrono::DateTime<Utc>,
) -> Finding {
    Finding {
        provider: Provider::Aws,
        rule_id: "aws.resource.untagged".into(),
        resource_type: resource_type.into(),
        resource_id: resource_id.into(),
        target: region.map(str::to_string),
        title: title.into(),
        summary: summary.into(),
        reason: "No tags found on resource".into(),
        risk: RiskLevel::Low,
        confidence: ConfidenceLevel::Medium,
        detected_at: now,
        details,
        evidence: Evidence {
            signals_used: vec!["No tags found on resource".into()],
            signals_not_checked: vec![
                "IaC-managed intent".into(),
                "Organisation tagging policy exemptions".into(),
                "Resource ownership records outside the provider".into(),
            ],
            time_window: None,
        },
    }
}

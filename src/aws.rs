//! AWS provider: sessions, region catalog, discovery probes, scan driver.

pub mod rules;

use std::collections::HashSet;

use anyhow::{bail, Result};
use aws_config::{BehaviorVersion, Region};
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::{display::DisplayErrorContext, metadata::ProvideErrorMetadata};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    cli::commands::scan::ScanArgs,
    config::{AwsThresholds, Config},
    rules::RuleError,
    scanner::{discover_targets, run_scan, ProbeOutcome, ScanError, ScanReport, TargetPlan},
};

/// Region scanned when auto-discovery finds nothing.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Known AWS regions, used to reject typos before any network call.
pub static KNOWN_AWS_REGIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // US
        "us-east-1",
        "us-east-2",
        "us-west-1",
        "us-west-2",
        // Canada
        "ca-central-1",
        // Europe
        "eu-west-1",
        "eu-west-2",
        "eu-west-3",
        "eu-central-1",
        "eu-central-2",
        "eu-north-1",
        "eu-south-1",
        "eu-south-2",
        // Asia Pacific
        "ap-south-1",
        "ap-south-2",
        "ap-northeast-1",
        "ap-northeast-2",
        "ap-northeast-3",
        "ap-southeast-1",
        "ap-southeast-2",
        "ap-southeast-3",
        "ap-southeast-4",
        "ap-east-1",
        // South America
        "sa-east-1",
        // Middle East
        "me-south-1",
        "me-central-1",
        // Africa
        "af-south-1",
        // GovCloud
        "us-gov-east-1",
        "us-gov-west-1",
        // China (separate partition)
        "cn-north-1",
        "cn-northwest-1",
    ]
    .into_iter()
    .collect()
});

/// Per-region client bundle handed to every AWS rule.
pub struct AwsTargetContext {
    pub region: String,
    pub ec2: aws_sdk_ec2::Client,
    pub s3: aws_sdk_s3::Client,
    pub logs: aws_sdk_cloudwatchlogs::Client,
    pub thresholds: AwsThresholds,
}

/// Build the client bundle for one region via the default credential chain,
/// optionally pinned to a named profile.
pub async fn connect(
    profile: Option<&str>,
    region: &str,
    thresholds: &AwsThresholds,
) -> AwsTargetContext {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }
    let sdk_config = loader.load().await;

    AwsTargetContext {
        region: region.to_string(),
        ec2: aws_sdk_ec2::Client::new(&sdk_config),
        s3: aws_sdk_s3::Client::new(&sdk_config),
        logs: aws_sdk_cloudwatchlogs::Client::new(&sdk_config),
        thresholds: thresholds.clone(),
    }
}

/// Reject flag combinations and unknown region names before any API call.
pub fn validate_region_args(region: Option<&str>, all_regions: bool) -> Result<()> {
    if region.is_some() && all_regions {
        bail!(
            "Cannot specify both --region and --all-regions. Choose one:\n  \
             --region us-east-1        scan a specific region\n  \
             --all-regions             scan all active regions"
        );
    }
    if region.is_none() && !all_regions {
        bail!(
            "Must specify either --region or --all-regions for AWS.\n\
             Examples:\n  \
             cleancloud scan --provider aws --region us-east-1\n  \
             cleancloud scan --provider aws --all-regions"
        );
    }
    if let Some(region) = region {
        if !KNOWN_AWS_REGIONS.contains(region) {
            let mut known: Vec<&str> = KNOWN_AWS_REGIONS.iter().copied().collect();
            known.sort_unstable();
            bail!(
                "'{region}' is not a valid AWS region.\nKnown regions: {}",
                known.join(", ")
            );
        }
    }
    Ok(())
}

/// Scan AWS with either an explicit region or auto-discovered active
/// regions, per the scan arguments.
pub async fn scan_with_region_selection(
    args: &ScanArgs,
    config: &Config,
    progress_enabled: bool,
) -> Result<ScanReport, ScanError> {
    validate_region_args(args.region.as_deref(), args.all_regions).map_err(ScanError::Other)?;

    let profile = args.profile.clone();
    let thresholds = config.rules.aws.clone();

    let plan = if let Some(region) = &args.region {
        TargetPlan::explicit(vec![region.clone()])
    } else {
        info!("auto-detecting regions with resources");
        let candidates = match enumerate_enabled_regions(profile.as_deref()).await {
            Ok(regions) => regions,
            Err(err) => {
                warn!("could not enumerate enabled regions: {err:#}");
                Vec::new()
            }
        };
        let probe_profile = profile.clone();
        let active = discover_targets(
            candidates,
            |candidate| {
                let profile = probe_profile.clone();
                async move { probe_region(profile.as_deref(), &candidate).await }
            },
            DEFAULT_REGION,
        )
        .await;
        info!("scanning {} region(s): {}", active.len(), active.join(", "));
        TargetPlan::discovered(active)
    };

    let registry = rules::registry();
    let progress = scan_progress(plan.targets.len(), progress_enabled);

    let report = run_scan(
        &plan,
        &registry,
        |spec| {
            let profile = profile.clone();
            let thresholds = thresholds.clone();
            let region = spec.id.clone();
            async move { Ok(connect(profile.as_deref(), &region, &thresholds).await) }
        },
        Some(&progress),
    )
    .await?;
    progress.finish_and_clear();

    Ok(report)
}

/// Enabled regions for the account (`opt-in-not-required` or `opted-in`).
pub async fn enumerate_enabled_regions(profile: Option<&str>) -> Result<Vec<String>> {
    let ctx = connect(profile, DEFAULT_REGION, &AwsThresholds::default()).await;
    let filter = aws_sdk_ec2::types::Filter::builder()
        .name("opt-in-status")
        .values("opt-in-not-required")
        .values("opted-in")
        .build();
    let output = ctx
        .ec2
        .describe_regions()
        .all_regions(false)
        .filters(filter)
        .send()
        .await
        .map_err(|err| anyhow::anyhow!("DescribeRegions failed: {}", DisplayErrorContext(err)))?;
    Ok(output
        .regions()
        .iter()
        .filter_map(|r| r.region_name().map(str::to_string))
        .collect())
}

/// Cheap presence check: does the region hold anything this scanner cares
/// about? Short-circuits on the first non-empty listing.
pub async fn probe_region(profile: Option<&str>, region: &str) -> ProbeOutcome {
    let ctx = connect(profile, region, &AwsThresholds::default()).await;

    // Some regions reject MaxResults below 5.
    let volumes = ctx.ec2.describe_volumes().max_results(5).send().await;
    match volumes {
        Ok(output) if !output.volumes().is_empty() => return ProbeOutcome::active(),
        Ok(_) => {}
        Err(err) => return ProbeOutcome::errored(probe_error(classify_sdk_error("DescribeVolumes", err))),
    }

    let snapshots = ctx.ec2.describe_snapshots().owner_ids("self").max_results(5).send().await;
    match snapshots {
        Ok(output) if !output.snapshots().is_empty() => return ProbeOutcome::active(),
        Ok(_) => {}
        Err(err) => {
            return ProbeOutcome::errored(probe_error(classify_sdk_error("DescribeSnapshots", err)))
        }
    }

    let log_groups = ctx.logs.describe_log_groups().limit(1).send().await;
    match log_groups {
        Ok(output) if !output.log_groups().is_empty() => ProbeOutcome::active(),
        Ok(_) => ProbeOutcome::inactive(),
        Err(err) => {
            ProbeOutcome::errored(probe_error(classify_sdk_error("DescribeLogGroups", err)))
        }
    }
}

fn probe_error(err: RuleError) -> String {
    match err {
        RuleError::PermissionDenied(msg) => format!("Permission error: {msg}"),
        other => format!("Error: {other}"),
    }
}

fn scan_progress(targets: usize, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template("{spinner} Scanning targets [{bar:30}] {pos}/{len}")
        .expect("progress bar style template should compile");
    ProgressBar::new(targets as u64).with_style(style)
}

/// Map an SDK error onto the scanner's taxonomy. Dispatch and timeout
/// failures are connectivity (the strongest invalid-region signal);
/// recognised auth codes are permission problems; the rest is API noise.
pub(crate) fn classify_sdk_error<E, R>(what: &str, err: SdkError<E, R>) -> RuleError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let is_dispatch = matches!(err, SdkError::DispatchFailure(_) | SdkError::TimeoutError(_));
    let code = err.code().map(str::to_string);
    let message = format!("{what}: {}", DisplayErrorContext(err));

    if is_dispatch {
        return RuleError::Connectivity(message);
    }
    match code.as_deref() {
        Some("UnauthorizedOperation") | Some("AuthFailure") | Some("ExpiredToken")
        | Some("InvalidClientTokenId") => RuleError::PermissionDenied(message),
        Some(code) if code.starts_with("AccessDenied") => RuleError::PermissionDenied(message),
        _ => RuleError::Api(message),
    }
}

/// Convert an SDK timestamp into chrono for age arithmetic.
pub(crate) fn to_chrono(dt: &aws_smithy_types::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

/// Serialize EC2-style tag lists for the finding details bag, preserving the
/// `[{Key, Value}]` shape the tag filter understands.
pub(crate) fn tags_to_json(tags: &[aws_sdk_ec2::types::Tag]) -> serde_json::Value {
    serde_json::Value::Array(
        tags.iter()
            .map(|t| json!({"Key": t.key().unwrap_or_default(), "Value": t.value().unwrap_or_default()}))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_regions_include_the_default() {
        assert!(KNOWN_AWS_REGIONS.contains(DEFAULT_REGION));
        assert!(KNOWN_AWS_REGIONS.contains("eu-west-1"));
        assert!(!KNOWN_AWS_REGIONS.contains("mars-east-1"));
    }

    #[test]
    fn validate_rejects_missing_and_conflicting_flags() {
        assert!(validate_region_args(None, false).is_err());
        assert!(validate_region_args(Some("us-east-1"), true).is_err());
        assert!(validate_region_args(Some("us-east-1"), false).is_ok());
        assert!(validate_region_args(None, true).is_ok());
    }

    #[test]
    fn validate_rejects_unknown_region_names() {
        let err = validate_region_args(Some("us-fake-9"), false).unwrap_err();
        assert!(err.to_string().contains("not a valid AWS region"));
    }
}

//! Report rendering: human, JSON, and CSV views of a finished scan.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;

use crate::{
    cli::commands::output::{OutputArgs, ReportOutputFormat},
    cli::global::GlobalArgs,
    finding::{ConfidenceLevel, Finding},
    scanner::{FailureClassification, ScanReport},
};

mod csv_format;
mod human_format;
mod json_format;
pub mod styles;

use styles::Styles;

/// Version of the JSON report schema, bumped on breaking payload changes.
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

/// A target whose scan was incomplete: some rules failed, or the whole
/// target was skipped. Surfaced so a best-effort report is never mistaken
/// for a complete one.
#[derive(Debug, Serialize, JsonSchema)]
pub struct TargetFailureSummary {
    pub target: String,
    pub rules_succeeded: usize,
    pub rules_failed: usize,
    /// No rule succeeded; the target contributed no findings.
    pub skipped: bool,
}

/// Aggregate counts rendered at the end of every report.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ScanSummary {
    pub total_findings: usize,
    pub by_provider: BTreeMap<String, usize>,
    pub by_risk: BTreeMap<String, usize>,
    pub by_confidence: BTreeMap<String, usize>,
    pub scanned_at: DateTime<Utc>,
    pub targets_scanned: Vec<String>,
    pub target_selection_mode: String,
    pub highest_confidence: Option<ConfidenceLevel>,
    pub high_confidence_findings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored_by_tag_policy: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub incomplete_targets: Vec<TargetFailureSummary>,
}

impl ScanSummary {
    pub fn build(report: &ScanReport, findings: &[Finding], ignored_count: usize) -> Self {
        let mut by_provider: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_risk: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_confidence: BTreeMap<String, usize> = BTreeMap::new();
        for finding in findings {
            *by_provider.entry(finding.provider.to_string()).or_default() += 1;
            *by_risk.entry(finding.risk.to_string()).or_default() += 1;
            *by_confidence.entry(finding.confidence.to_string()).or_default() += 1;
        }

        // Outcomes arrive in completion order; sort for stable reports.
        let mut incomplete_targets: Vec<TargetFailureSummary> = report
            .outcomes
            .iter()
            .filter(|o| o.classification != FailureClassification::None)
            .map(|o| TargetFailureSummary {
                target: o.target.clone(),
                rules_succeeded: o.rules_succeeded,
                rules_failed: o.rules_failed,
                skipped: o.classification == FailureClassification::Fatal,
            })
            .collect();
        incomplete_targets.sort_by(|a, b| a.target.cmp(&b.target));

        Self {
            total_findings: findings.len(),
            by_provider,
            by_risk,
            by_confidence,
            scanned_at: Utc::now(),
            targets_scanned: report.targets_scanned.clone(),
            target_selection_mode: report.selection_mode.to_string(),
            highest_confidence: findings.iter().map(|f| f.confidence).max(),
            high_confidence_findings: findings
                .iter()
                .filter(|f| f.confidence == ConfidenceLevel::High)
                .count(),
            ignored_by_tag_policy: (ignored_count > 0).then_some(ignored_count),
            incomplete_targets,
        }
    }
}

/// Render the report in the requested format.
pub fn run(
    global_args: &GlobalArgs,
    findings: &[Finding],
    summary: &ScanSummary,
    output_args: &OutputArgs<ReportOutputFormat>,
) -> Result<()> {
    output_args.format.require_output_file(output_args)?;

    let use_color = global_args.use_color(std::io::stdout()) && !output_args.has_output_file();
    let reporter = Reporter { styles: Styles::new(use_color) };
    let mut writer = output_args.get_writer()?;

    match output_args.format {
        ReportOutputFormat::Human => reporter.human_format(&mut writer, findings, summary)?,
        ReportOutputFormat::Json => reporter.json_format(&mut writer, findings, summary)?,
        ReportOutputFormat::Csv => reporter.csv_format(&mut writer, findings)?,
    }
    writer.flush()?;
    Ok(())
}

pub struct Reporter {
    pub styles: Styles,
}

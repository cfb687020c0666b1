use std::path::PathBuf;

use clap::{Args, ValueEnum, ValueHint};
use strum::Display;

use crate::{
    cli::commands::output::{OutputArgs, ReportOutputFormat},
    finding::{ConfidenceLevel, Provider},
};

/// `cleancloud scan` command and flags
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Cloud provider to scan
    #[arg(long, value_enum)]
    pub provider: ProviderKind,

    /// Specific region to scan (AWS region, or Azure location filter)
    #[arg(long)]
    pub region: Option<String>,

    /// Scan all regions with resources (auto-detects active regions)
    #[arg(long, default_value_t = false)]
    pub all_regions: bool,

    /// Azure subscription id to scan (repeatable)
    #[arg(long = "subscription", value_name = "ID")]
    pub subscription: Vec<String>,

    /// Scan every accessible Azure subscription
    #[arg(long, default_value_t = false)]
    pub all_subscriptions: bool,

    /// AWS CLI profile name
    #[arg(long)]
    pub profile: Option<String>,

    #[command(flatten)]
    pub output_args: OutputArgs<ReportOutputFormat>,

    /// Exit with code 2 if any findings are detected
    #[arg(long, default_value_t = false)]
    pub fail_on_findings: bool,

    /// Exit with code 2 if findings at or above this confidence exist
    #[arg(long, value_enum, ignore_case = true, value_name = "LEVEL")]
    pub fail_on_confidence: Option<ConfidenceArg>,

    /// Path to cleancloud.yaml
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Ignore findings by tag, as KEY or KEY:VALUE (repeatable, overrides
    /// config)
    #[arg(long = "ignore-tag", value_name = "KEY[:VALUE]")]
    pub ignore_tag: Vec<String>,
}

/// Providers selectable on the command line
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, ValueEnum)]
#[strum(serialize_all = "kebab-case")]
pub enum ProviderKind {
    Aws,
    Azure,
}

impl From<ProviderKind> for Provider {
    fn from(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Aws => Provider::Aws,
            ProviderKind::Azure => Provider::Azure,
        }
    }
}

/// Confidence levels accepted by --fail-on-confidence
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfidenceArg {
    Low,
    Medium,
    High,
}

impl From<ConfidenceArg> for ConfidenceLevel {
    fn from(level: ConfidenceArg) -> Self {
        match level {
            ConfidenceArg::Low => ConfidenceLevel::Low,
            ConfidenceArg::Medium => ConfidenceLevel::Medium,
            ConfidenceArg::High => ConfidenceLevel::High,
        }
    }
}

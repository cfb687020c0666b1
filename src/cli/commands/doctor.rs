use std::path::PathBuf;

use clap::{Args, ValueHint};

use crate::cli::commands::scan::ProviderKind;

/// `cleancloud doctor` command and flags
#[derive(Args, Debug, Clone)]
pub struct DoctorArgs {
    /// Cloud provider to validate (omit to check both)
    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// AWS region for validation (default: us-east-1)
    #[arg(long)]
    pub region: Option<String>,

    /// AWS profile name
    #[arg(long)]
    pub profile: Option<String>,

    /// Path to cleancloud.yaml
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
}

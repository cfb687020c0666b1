//! Credential and environment diagnostics (`cleancloud doctor`).
//!
//! Read-only validation of provider access: which auth method is in play,
//! whether it can actually authenticate, and whether the configuration file
//! parses. Exit codes follow the scan contract: 0 ok, 1 unexpected error,
//! 3 credential problem.

mod aws;
mod azure;

use thiserror::Error;
use tracing::warn;

use crate::{
    cli::commands::{doctor::DoctorArgs, scan::ProviderKind},
    config::Config,
    policy::{EXIT_OK, EXIT_PERMISSION_ERROR},
};

/// An expected, actionable validation failure.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DoctorError(pub String);

pub(crate) fn info(msg: &str) {
    println!("{msg}");
}

pub(crate) fn success(msg: &str) {
    println!("  ok: {msg}");
}

pub(crate) fn advise(msg: &str) {
    println!("  hint: {msg}");
}

pub(crate) fn fail(msg: &str) -> DoctorError {
    println!("  FAILED: {msg}");
    DoctorError(msg.to_string())
}

enum CheckStatus {
    Passed,
    Failed(String),
}

/// Run the diagnostics and return the process exit code.
pub async fn run_doctor(args: &DoctorArgs) -> i32 {
    let providers: Vec<ProviderKind> = match args.provider {
        Some(provider) => vec![provider],
        None => vec![ProviderKind::Aws, ProviderKind::Azure],
    };
    let single = providers.len() == 1;

    info("");
    info("======================================================================");
    info("CLEANCLOUD ENVIRONMENT DIAGNOSTICS");
    info("======================================================================");
    info(&format!(
        "Providers to check: {}",
        providers.iter().map(|p| p.to_string().to_uppercase()).collect::<Vec<_>>().join(", ")
    ));
    info("");

    let mut results: Vec<(ProviderKind, CheckStatus)> = Vec::new();

    for provider in &providers {
        let status = match provider {
            ProviderKind::Aws => {
                match aws::run_aws_doctor(args.profile.as_deref(), args.region.as_deref()).await {
                    Ok(()) => CheckStatus::Passed,
                    Err(err) => CheckStatus::Failed(err.to_string()),
                }
            }
            ProviderKind::Azure => {
                if args.region.is_some() {
                    info("note: --region is only used for the AWS provider and is ignored here");
                }
                match azure::run_azure_doctor().await {
                    Ok(()) => CheckStatus::Passed,
                    Err(err) => CheckStatus::Failed(err.to_string()),
                }
            }
        };

        if single {
            return match status {
                CheckStatus::Passed => check_config(args),
                CheckStatus::Failed(_) => EXIT_PERMISSION_ERROR,
            };
        }
        if let CheckStatus::Failed(_) = &status {
            info("");
            info(&format!(
                "{} validation failed, continuing to next provider...",
                provider.to_string().to_uppercase()
            ));
            info("");
        }
        results.push((*provider, status));
    }

    info("");
    info("======================================================================");
    info("FINAL SUMMARY");
    info("======================================================================");
    let mut all_passed = true;
    for (provider, status) in &results {
        let name = provider.to_string().to_uppercase();
        match status {
            CheckStatus::Passed => info(&format!("{name}: PASSED")),
            CheckStatus::Failed(err) => {
                all_passed = false;
                info(&format!("{name}: FAILED"));
                info(&format!("  error: {err}"));
            }
        }
    }
    info("");

    if all_passed {
        info("All providers validated successfully");
        check_config(args)
    } else {
        info("Some providers failed validation; fix the errors above and re-run `cleancloud doctor`");
        EXIT_PERMISSION_ERROR
    }
}

/// Config problems are surfaced but never fatal for doctor.
fn check_config(args: &DoctorArgs) -> i32 {
    match Config::load(args.config.as_deref()) {
        Ok(config) => {
            if !config.ignore_tag_rules().is_empty() {
                info("");
                info("Tag filtering is enabled; some findings may be intentionally ignored");
            }
        }
        Err(err) => warn!("config validation warning: {err:#}"),
    }
    EXIT_OK
}

use assert_cmd::Command;
use predicates::str::contains;

fn cleancloud() -> Command {
    let mut cmd = Command::cargo_bin("cleancloud").unwrap();
    // Make sure ambient credentials never leak into these tests.
    for var in [
        "AZURE_CLIENT_ID",
        "AZURE_TENANT_ID",
        "AZURE_CLIENT_SECRET",
        "AZURE_SUBSCRIPTION_ID",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// AWS requires an explicit region choice before any network call.
#[test]
fn aws_scan_requires_region_or_all_regions() {
    cleancloud()
        .args(["scan", "--provider", "aws"])
        .assert()
        .code(1)
        .stderr(contains("Must specify either --region or --all-regions"));
}

/// --region and --all-regions are mutually exclusive.
#[test]
fn aws_scan_rejects_conflicting_region_flags() {
    cleancloud()
        .args(["scan", "--provider", "aws", "--region", "us-east-1", "--all-regions"])
        .assert()
        .code(1)
        .stderr(contains("Cannot specify both --region and --all-regions"));
}

/// Region typos are rejected offline, against the known-region set.
#[test]
fn aws_scan_rejects_unknown_region() {
    cleancloud()
        .args(["scan", "--provider", "aws", "--region", "us-fake-9"])
        .assert()
        .code(1)
        .stderr(contains("not a valid AWS region"));
}

/// Missing Azure credentials map to the permission exit code, with an
/// actionable message, before any token request is attempted.
#[test]
fn azure_scan_without_credentials_exits_with_permission_error() {
    cleancloud()
        .args(["scan", "--provider", "azure"])
        .assert()
        .code(3)
        .stderr(contains("AZURE_CLIENT_ID"));
}

/// A missing --config file is an error, not a silent fallback.
#[test]
fn scan_fails_for_missing_config_file() {
    cleancloud()
        .args([
            "scan",
            "--provider",
            "aws",
            "--region",
            "us-east-1",
            "--config",
            "/no/such/cleancloud.yaml",
        ])
        .assert()
        .code(1)
        .stderr(contains("config file not found"));
}

/// clap rejects unknown providers and confidence levels on its own.
#[test]
fn scan_rejects_unknown_provider() {
    cleancloud().args(["scan", "--provider", "gcp"]).assert().failure();
}

#[test]
fn scan_rejects_unknown_confidence_level() {
    cleancloud()
        .args([
            "scan",
            "--provider",
            "aws",
            "--region",
            "us-east-1",
            "--fail-on-confidence",
            "certain",
        ])
        .assert()
        .failure();
}

/// Azure doctor reports missing service-principal configuration as a
/// credential failure (exit 3), entirely offline.
#[test]
fn azure_doctor_without_credentials_fails_with_permission_exit() {
    cleancloud()
        .args(["doctor", "--provider", "azure"])
        .assert()
        .code(3)
        .stdout(contains("AZURE_CLIENT_ID"));
}

/// Doctor validates the AWS region before touching the network.
#[test]
fn aws_doctor_rejects_unknown_region() {
    cleancloud()
        .args(["doctor", "--provider", "aws", "--region", "moon-base-1"])
        .assert()
        .code(3)
        .stdout(contains("not a valid AWS region"));
}

//! AWS credential diagnostics.

use aws_config::{BehaviorVersion, Region};
use aws_smithy_types::error::display::DisplayErrorContext;

use super::{advise, fail, info, success, DoctorError};
use crate::aws::{DEFAULT_REGION, KNOWN_AWS_REGIONS};

/// Heuristic description of where the credentials come from, with CI/CD
/// suitability hints. Detection is from the environment, before any call.
fn detect_auth_method(profile: Option<&str>) -> (&'static str, String) {
    let has_web_identity = std::env::var("AWS_WEB_IDENTITY_TOKEN_FILE").is_ok();
    let has_access_key = std::env::var("AWS_ACCESS_KEY_ID").is_ok();
    let has_session_token = std::env::var("AWS_SESSION_TOKEN").is_ok();

    if has_web_identity {
        ("oidc", "OIDC (AssumeRoleWithWebIdentity); temporary credentials, CI/CD ready".into())
    } else if has_access_key && has_session_token {
        ("temporary_keys", "Temporary credentials from environment variables".into())
    } else if has_access_key {
        (
            "env_keys",
            "Long-lived access keys from environment variables; prefer OIDC or a role".into(),
        )
    } else if let Some(profile) = profile {
        ("profile", format!("AWS CLI profile '{profile}' (~/.aws/credentials)"))
    } else if std::env::var("AWS_PROFILE").is_ok() {
        (
            "profile",
            format!(
                "AWS CLI profile '{}' (~/.aws/credentials)",
                std::env::var("AWS_PROFILE").unwrap_or_default()
            ),
        )
    } else {
        ("default_chain", "Default credential chain (instance profile, SSO, or config)".into())
    }
}

pub async fn run_aws_doctor(
    profile: Option<&str>,
    region: Option<&str>,
) -> Result<(), DoctorError> {
    info("Checking AWS...");

    let region = region.unwrap_or(DEFAULT_REGION);
    if !KNOWN_AWS_REGIONS.contains(region) {
        return Err(fail(&format!("'{region}' is not a valid AWS region")));
    }

    let (method, description) = detect_auth_method(profile);
    success(&format!("auth method: {description}"));
    if method == "env_keys" {
        advise("rotate long-lived access keys regularly, or switch to OIDC for CI/CD");
    }

    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }
    let sdk_config = loader.load().await;
    let sts = aws_sdk_sts::Client::new(&sdk_config);

    match sts.get_caller_identity().send().await {
        Ok(identity) => {
            success(&format!(
                "authenticated as {} (account {})",
                identity.arn().unwrap_or("<unknown arn>"),
                identity.account().unwrap_or("<unknown account>"),
            ));
            success(&format!("region: {region}"));
            Ok(())
        }
        Err(err) => {
            advise("check AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY, your profile, or your role");
            Err(fail(&format!(
                "could not validate AWS credentials: {}",
                DisplayErrorContext(err)
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_profile_wins_over_default_chain() {
        // Env-var based branches depend on ambient state, so only the
        // profile branch is asserted here.
        if std::env::var("AWS_WEB_IDENTITY_TOKEN_FILE").is_err()
            && std::env::var("AWS_ACCESS_KEY_ID").is_err()
        {
            let (method, description) = detect_auth_method(Some("staging"));
            assert_eq!(method, "profile");
            assert!(description.contains("staging"));
        }
    }
}

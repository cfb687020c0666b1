//! Azure provider: client-credential auth, ARM REST access, scan driver.
//!
//! The small set of Azure Resource Manager calls this scanner needs is
//! issued directly through `reqwest` rather than an SDK crate: the list
//! endpoints are stable, the response shapes are tiny, and raw requests
//! keep the binary lean while letting us pick API versions explicitly.

pub mod rules;

use std::{collections::HashMap, env, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{info, warn};
use url::Url;

use crate::{
    cli::commands::scan::ScanArgs,
    config::{AzureThresholds, Config},
    rules::RuleError,
    scanner::{run_scan, ScanError, ScanReport, TargetPlan},
};

const MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
const LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";
const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";
pub(crate) const COMPUTE_API_VERSION: &str = "2023-04-02";
pub(crate) const NETWORK_API_VERSION: &str = "2023-09-01";

/// An authenticated ARM session shared by every subscription scan.
pub struct AzureSession {
    http: reqwest::Client,
    token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ArmList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionEntry {
    #[serde(rename = "subscriptionId")]
    subscription_id: String,
}

impl AzureSession {
    /// Authenticate with the client-credential flow from environment
    /// variables (non-interactive, CI/CD friendly): `AZURE_CLIENT_ID`,
    /// `AZURE_TENANT_ID`, `AZURE_CLIENT_SECRET`.
    pub async fn connect() -> Result<Self, ScanError> {
        let client_id = env::var("AZURE_CLIENT_ID").ok();
        let tenant_id = env::var("AZURE_TENANT_ID").ok();
        let client_secret = env::var("AZURE_CLIENT_SECRET").ok();

        let (Some(client_id), Some(tenant_id), Some(client_secret)) =
            (client_id, tenant_id, client_secret)
        else {
            return Err(ScanError::Permission(
                "Missing Azure environment variables for authentication. Set AZURE_CLIENT_ID, \
                 AZURE_TENANT_ID, AZURE_CLIENT_SECRET."
                    .into(),
            ));
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| ScanError::Other(err.into()))?;

        let token_url = format!("{LOGIN_ENDPOINT}/{tenant_id}/oauth2/v2.0/token");
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("scope", "https://management.azure.com/.default"),
        ];
        let response = http
            .post(&token_url)
            .form(&params)
            .send()
            .await
            .map_err(|err| ScanError::Other(anyhow::anyhow!("Azure token request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::Permission(format!(
                "Azure token request rejected ({status}): {}",
                body.trim()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| ScanError::Other(anyhow::anyhow!("malformed token response: {err}")))?;

        Ok(Self { http, token: token.access_token })
    }

    /// Every subscription id the credential can read.
    pub async fn list_subscription_ids(&self) -> Result<Vec<String>, ScanError> {
        let url = format!(
            "{MANAGEMENT_ENDPOINT}/subscriptions?api-version={SUBSCRIPTIONS_API_VERSION}"
        );
        let entries: Vec<SubscriptionEntry> = self
            .get_all(&url)
            .await
            .map_err(|err| match err {
                RuleError::PermissionDenied(msg) => ScanError::Permission(msg),
                other => ScanError::Other(anyhow::anyhow!("{other}")),
            })?;
        Ok(entries.into_iter().map(|e| e.subscription_id).collect())
    }

    /// GET an ARM list endpoint, following `nextLink` pagination.
    pub(crate) async fn get_all<T: DeserializeOwned>(
        &self,
        first_url: &str,
    ) -> Result<Vec<T>, RuleError> {
        let mut items = Vec::new();
        let mut next = Some(
            Url::parse(first_url)
                .map_err(|err| RuleError::Api(format!("invalid ARM URL {first_url}: {err}")))?,
        );

        while let Some(url) = next.take() {
            let response = self
                .http
                .get(url.clone())
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|err| classify_http_error(url.as_str(), err))?;

            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                let body = response.text().await.unwrap_or_default();
                return Err(RuleError::PermissionDenied(format!(
                    "ARM request to {url} rejected ({status}): {}",
                    body.trim()
                )));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RuleError::Api(format!(
                    "ARM request to {url} failed ({status}): {}",
                    body.trim()
                )));
            }

            let page: ArmList<T> = response
                .json()
                .await
                .map_err(|err| RuleError::Api(format!("malformed ARM response from {url}: {err}")))?;
            items.extend(page.value);
            next = match page.next_link {
                Some(link) => Some(
                    Url::parse(&link)
                        .map_err(|err| RuleError::Api(format!("invalid nextLink {link}: {err}")))?,
                ),
                None => None,
            };
        }

        Ok(items)
    }
}

fn classify_http_error(what: &str, err: reqwest::Error) -> RuleError {
    if err.is_connect() || err.is_timeout() {
        RuleError::Connectivity(format!("{what}: {err}"))
    } else {
        RuleError::Api(format!("{what}: {err}"))
    }
}

/// Per-subscription context handed to every Azure rule.
pub struct AzureTargetContext {
    pub session: Arc<AzureSession>,
    pub subscription_id: String,
    /// Optional location filter from `--region`.
    pub region_filter: Option<String>,
    pub thresholds: AzureThresholds,
}

impl AzureTargetContext {
    pub(crate) fn location_excluded(&self, location: &str) -> bool {
        matches!(&self.region_filter, Some(filter) if filter != location)
    }

    pub(crate) fn compute_list_url(&self, resource: &str) -> String {
        format!(
            "{MANAGEMENT_ENDPOINT}/subscriptions/{}/providers/Microsoft.Compute/{resource}\
             ?api-version={COMPUTE_API_VERSION}",
            self.subscription_id
        )
    }

    pub(crate) fn network_list_url(&self, resource: &str) -> String {
        format!(
            "{MANAGEMENT_ENDPOINT}/subscriptions/{}/providers/Microsoft.Network/{resource}\
             ?api-version={NETWORK_API_VERSION}",
            self.subscription_id
        )
    }
}

// ── ARM resource models (only the fields the rules read) ─────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedDisk {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub managed_by: Option<String>,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub sku: Option<ResourceSku>,
    #[serde(default)]
    pub properties: DiskProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskProperties {
    #[serde(default)]
    pub time_created: Option<DateTime<Utc>>,
    #[serde(default, rename = "diskSizeGB")]
    pub disk_size_gb: Option<i64>,
    #[serde(default)]
    pub disk_state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedSnapshot {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub sku: Option<ResourceSku>,
    #[serde(default)]
    pub properties: DiskProperties,
}

#[derive(Debug, Deserialize)]
pub struct ResourceSku {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpAddress {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub properties: PublicIpProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpProperties {
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Present iff the address is attached to a NIC, load balancer, etc.
    #[serde(default)]
    pub ip_configuration: Option<serde_json::Value>,
}

// ── scan driver ──────────────────────────────────────────────────────────

/// Scan Azure subscriptions: explicitly named ones, or every subscription
/// the credential can see.
pub async fn scan_with_subscription_selection(
    args: &ScanArgs,
    config: &Config,
    progress_enabled: bool,
) -> Result<ScanReport, ScanError> {
    if !args.subscription.is_empty() && args.all_subscriptions {
        warn!("--all-subscriptions is redundant with --subscription; scanning only the specified subscriptions");
    }

    info!("authenticating to Azure");
    let session = Arc::new(AzureSession::connect().await?);

    let plan = if !args.subscription.is_empty() {
        TargetPlan::explicit(args.subscription.clone())
    } else if let Ok(subscription) = env::var("AZURE_SUBSCRIPTION_ID") {
        TargetPlan::explicit(vec![subscription])
    } else {
        let mut subscriptions = session.list_subscription_ids().await?;
        if subscriptions.is_empty() {
            return Err(ScanError::Permission(
                "No accessible Azure subscriptions found".into(),
            ));
        }
        subscriptions.sort();
        info!("found {} subscription(s)", subscriptions.len());
        TargetPlan::discovered(subscriptions)
    };

    let registry = rules::registry();
    let thresholds = config.rules.azure.clone();
    let region_filter = args.region.clone();
    let progress = scan_progress(plan.targets.len(), progress_enabled);

    let report = run_scan(
        &plan,
        &registry,
        |spec| {
            let context = AzureTargetContext {
                session: Arc::clone(&session),
                subscription_id: spec.id.clone(),
                region_filter: region_filter.clone(),
                thresholds: thresholds.clone(),
            };
            async move { Ok(context) }
        },
        Some(&progress),
    )
    .await?;
    progress.finish_and_clear();

    Ok(report)
}

fn scan_progress(targets: usize, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let style =
        ProgressStyle::with_template("{spinner} Scanning subscriptions [{bar:30}] {pos}/{len}")
            .expect("progress bar style template should compile");
    ProgressBar::new(targets as u64).with_style(style)
}

/// Serialize an Azure tag map for the finding details bag.
pub(crate) fn tags_to_json(tags: &Option<HashMap<String, String>>) -> serde_json::Value {
    match tags {
        Some(tags) => serde_json::to_value(tags).unwrap_or(serde_json::Value::Null),
        None => serde_json::Value::Null,
    }
}

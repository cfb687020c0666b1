//! The canonical finding record produced by every detection rule.
//!
//! A `Finding` is created once by a rule and never mutated afterwards, with
//! one exception: the target scanner stamps the `target` field so that
//! attribution is authoritative regardless of what the rule filled in.

use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cloud provider a finding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Azure,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Aws => write!(f, "aws"),
            Provider::Azure => write!(f, "azure"),
        }
    }
}

/// Impact if the flagged issue is real.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// Epistemic certainty that a finding is a real issue, distinct from risk.
///
/// Ordered LOW < MEDIUM < HIGH so that threshold comparisons in the exit
/// policy are plain `>=` checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    fn ordinal(self) -> u8 {
        match self {
            ConfidenceLevel::Low => 1,
            ConfidenceLevel::Medium => 2,
            ConfidenceLevel::High => 3,
        }
    }
}

impl PartialOrd for ConfidenceLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConfidenceLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal().cmp(&other.ordinal())
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ConfidenceLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(ConfidenceLevel::Low),
            "medium" => Ok(ConfidenceLevel::Medium),
            "high" => Ok(ConfidenceLevel::High),
            _ => Err(anyhow!("Invalid confidence level: {}", s)),
        }
    }
}

// Case-insensitive on input, lowercase on output.
impl Serialize for ConfidenceLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ConfidenceLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for ConfidenceLevel {
    fn schema_name() -> String {
        "ConfidenceLevel".to_string()
    }

    fn json_schema(_gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        let mut schema = schemars::schema::SchemaObject::default();
        schema.enum_values = Some(vec!["low".into(), "medium".into(), "high".into()]);
        schemars::schema::Schema::Object(schema)
    }
}

/// Explicit disclosure of what was and was not verified before flagging.
///
/// Every finding must name at least one signal in `signals_used`; a finding
/// with no justification is a defect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Evidence {
    /// Signals that were actually checked and support the finding.
    pub signals_used: Vec<String>,
    /// Signals that could change the verdict but were not checked.
    pub signals_not_checked: Vec<String>,
    /// Time window the signals cover, when age is part of the rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<String>,
}

/// A single flagged resource.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Finding {
    pub provider: Provider,
    /// Stable dotted identifier of the rule, e.g. `aws.ebs.unattached`.
    pub rule_id: String,
    pub resource_type: String,
    pub resource_id: String,
    /// Region or subscription the resource lives in. Rules may leave it
    /// unset (e.g. for global resources observed from a region); the target
    /// scanner stamps it authoritatively before the finding leaves the scan.
    pub target: Option<String>,

    pub title: String,
    pub summary: String,
    pub reason: String,

    pub risk: RiskLevel,
    pub confidence: ConfidenceLevel,

    /// When the scan observed the resource, not when the resource changed.
    pub detected_at: DateTime<Utc>,
    /// Provider-specific metadata (tags, ages, sizes).
    pub details: BTreeMap<String, serde_json::Value>,
    pub evidence: Evidence,
}

impl Finding {
    /// Extract the resource tags recorded in `details`, normalised to a flat
    /// key/value map. AWS rules record tags as a `[{"Key": .., "Value": ..}]`
    /// list, Azure rules as an object.
    pub fn tags(&self) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        match self.details.get("tags") {
            Some(serde_json::Value::Array(entries)) => {
                for entry in entries {
                    if let (Some(k), Some(v)) = (
                        entry.get("Key").and_then(|v| v.as_str()),
                        entry.get("Value").and_then(|v| v.as_str()),
                    ) {
                        tags.insert(k.to_string(), v.to_string());
                    }
                }
            }
            Some(serde_json::Value::Object(map)) => {
                for (k, v) in map {
                    if let Some(v) = v.as_str() {
                        tags.insert(k.clone(), v.to_string());
                    }
                }
            }
            _ => {}
        }
        tags
    }
}

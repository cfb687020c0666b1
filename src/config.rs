//! Layered YAML configuration.
//!
//! Sources, lowest precedence first: built-in defaults, then
//! `~/.cleancloud/config.yaml`, then `./cleancloud.yaml`, then an explicit
//! `--config PATH`. Later layers replace whole sections. The result is one
//! immutable [`Config`] value passed explicitly into the scan; there is no
//! process-wide configuration state.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;
use tracing::warn;

use crate::filtering::IgnoreTagRule;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub tag_filtering: Option<TagFilteringConfig>,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagFilteringConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub ignore: Vec<IgnoreTagEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IgnoreTagEntry {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    #[serde(default)]
    pub aws: AwsThresholds,
    #[serde(default)]
    pub azure: AzureThresholds,
}

/// Age thresholds for the AWS rules. Conservative defaults; a resource
/// younger than its threshold is never flagged.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsThresholds {
    /// Snapshots older than this are flagged.
    #[serde(default = "default_snapshot_age_days")]
    pub snapshot_age_days: i64,
}

impl Default for AwsThresholds {
    fn default() -> Self {
        Self { snapshot_age_days: default_snapshot_age_days() }
    }
}

/// Age thresholds for the Azure rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AzureThresholds {
    /// Unattached disks younger than this are ignored.
    #[serde(default = "default_disk_age_days")]
    pub disk_age_days: i64,
    /// Snapshots older than this are flagged.
    #[serde(default = "default_azure_snapshot_age_days")]
    pub snapshot_age_days: i64,
    /// Untagged snapshots younger than this are ignored.
    #[serde(default = "default_untagged_min_age_days")]
    pub untagged_min_age_days: i64,
}

impl Default for AzureThresholds {
    fn default() -> Self {
        Self {
            disk_age_days: default_disk_age_days(),
            snapshot_age_days: default_azure_snapshot_age_days(),
            untagged_min_age_days: default_untagged_min_age_days(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_snapshot_age_days() -> i64 {
    365
}

fn default_disk_age_days() -> i64 {
    7
}

fn default_azure_snapshot_age_days() -> i64 {
    30
}

fn default_untagged_min_age_days() -> i64 {
    7
}

/// A partially specified layer; present sections replace the ones below.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigLayer {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    tag_filtering: Option<TagFilteringConfig>,
    #[serde(default)]
    rules: Option<RulesConfig>,
}

impl Config {
    /// Load and merge every configuration layer. The explicit path must
    /// exist and parse; the implicit layers are skipped with a warning when
    /// unreadable.
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let mut config = Config::default();

        for path in implicit_layer_paths() {
            match load_layer(&path) {
                Ok(Some(layer)) => apply_layer(&mut config, layer),
                Ok(None) => {}
                Err(err) => warn!("skipping config {}: {err:#}", path.display()),
            }
        }

        if let Some(path) = explicit {
            let layer = load_layer(path)
                .with_context(|| format!("failed to load config {}", path.display()))?
                .ok_or_else(|| anyhow!("config file not found: {}", path.display()))?;
            apply_layer(&mut config, layer);
        }

        Ok(config)
    }

    /// Compiled ignore-tag rules, empty when tag filtering is disabled.
    pub fn ignore_tag_rules(&self) -> Vec<IgnoreTagRule> {
        match &self.tag_filtering {
            Some(tf) if tf.enabled => tf
                .ignore
                .iter()
                .map(|entry| IgnoreTagRule { key: entry.key.clone(), value: entry.value.clone() })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn implicit_layer_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(base) = BaseDirs::new() {
        paths.push(base.home_dir().join(".cleancloud").join("config.yaml"));
    }
    paths.push(PathBuf::from("cleancloud.yaml"));
    paths
}

fn load_layer(path: &Path) -> Result<Option<ConfigLayer>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let layer: ConfigLayer = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(layer))
}

fn apply_layer(config: &mut Config, layer: ConfigLayer) {
    if layer.version.is_some() {
        config.version = layer.version;
    }
    if layer.tag_filtering.is_some() {
        config.tag_filtering = layer.tag_filtering;
    }
    if let Some(rules) = layer.rules {
        config.rules = rules;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    use super::*;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_conservative() {
        let config = Config::default();
        assert_eq!(config.rules.aws.snapshot_age_days, 365);
        assert_eq!(config.rules.azure.disk_age_days, 7);
        assert_eq!(config.rules.azure.snapshot_age_days, 30);
        assert!(config.ignore_tag_rules().is_empty());
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let file = write_config(
            r#"
version: 1
rules:
  aws:
    snapshot_age_days: 90
tag_filtering:
  enabled: true
  ignore:
    - key: keep
    - key: env
      value: prod
"#,
        );
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.rules.aws.snapshot_age_days, 90);
        let rules = config.ignore_tag_rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].key, "keep");
        assert_eq!(rules[1].value.as_deref(), Some("prod"));
    }

    #[test]
    fn disabled_tag_filtering_compiles_no_rules() {
        let file = write_config(
            r#"
tag_filtering:
  enabled: false
  ignore:
    - key: keep
"#,
        );
        let config = Config::load(Some(file.path())).unwrap();
        assert!(config.ignore_tag_rules().is_empty());
    }

    #[test]
    fn unknown_top_level_keys_are_rejected() {
        let file = write_config("surprise: true\n");
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/definitely/not/here.yaml")))
            .expect_err("missing explicit config must fail");
        assert!(err.to_string().contains("not found"));
    }
}

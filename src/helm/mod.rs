// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Helm chart descriptors, the Helm client seam and the install-or-upgrade operation.

pub mod cli;
pub mod operation;

use crate::constants::helm::DEFAULT_TIMEOUT;
use crate::error::{AddonError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

pub use cli::HelmCli;
pub use operation::install_or_upgrade;

/// A chart repository to register before resolving charts from it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoConfig {
    /// Local repository alias, e.g. `cilium` in `cilium/cilium`
    pub name: String,
    pub url: String,
    /// Human-facing label used in messages
    pub repo_name: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub insecure_skip_tls_verify: bool,
}

impl RepoConfig {
    pub fn new(name: &str, url: &str, repo_name: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            repo_name: repo_name.to_string(),
            ..Default::default()
        }
    }

    /// Whether charts are pulled straight from an OCI registry
    pub fn is_oci(&self) -> bool {
        self.url.starts_with("oci://")
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AddonError::InvalidRepository {
                name: self.repo_name.clone(),
                message: "repository name is empty".to_string(),
            });
        }

        let parsed = url::Url::parse(&self.url).map_err(|e| AddonError::InvalidRepository {
            name: self.repo_name.clone(),
            message: format!("invalid URL {}: {}", self.url, e),
        })?;

        match parsed.scheme() {
            "http" | "https" | "oci" => Ok(()),
            other => Err(AddonError::InvalidRepository {
                name: self.repo_name.clone(),
                message: format!("unsupported URL scheme {}", other),
            }),
        }
    }
}

/// What to install and how
#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    pub release_name: String,
    /// Chart reference, e.g. `cilium/cilium` or `oci://registry/chart`
    pub chart_name: String,
    pub version: Option<String>,
    pub namespace: String,
    /// Used with `--repo` when the chart reference is not repository-qualified
    pub repo_url: Option<String>,
    pub create_namespace: bool,
    pub atomic: bool,
    pub wait: bool,
    pub wait_for_jobs: bool,
    pub upgrade_crds: bool,
    pub timeout: Option<Duration>,
    pub set_vals: BTreeMap<String, String>,
    pub set_file_vals: BTreeMap<String, String>,
    pub set_json_vals: BTreeMap<String, String>,
    pub values_files: Vec<PathBuf>,
}

impl ChartConfig {
    pub fn new(release_name: &str, chart_name: &str, namespace: &str) -> Self {
        Self {
            release_name: release_name.to_string(),
            chart_name: chart_name.to_string(),
            version: None,
            namespace: namespace.to_string(),
            repo_url: None,
            create_namespace: true,
            atomic: true,
            wait: true,
            wait_for_jobs: false,
            upgrade_crds: true,
            timeout: None,
            set_vals: BTreeMap::new(),
            set_file_vals: BTreeMap::new(),
            set_json_vals: BTreeMap::new(),
            values_files: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn with_json_value(mut self, key: &str, json: &str) -> Self {
        self.set_json_vals.insert(key.to_string(), json.to_string());
        self
    }

    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.set_vals.insert(key.to_string(), value.to_string());
        self
    }

    /// Resolve into a concrete spec. The chart's own timeout wins, then the
    /// caller's, then [`DEFAULT_TIMEOUT`].
    pub fn to_spec(&self, fallback_timeout: Duration) -> ChartSpec {
        let timeout = self
            .timeout
            .filter(|t| !t.is_zero())
            .or_else(|| Some(fallback_timeout).filter(|t| !t.is_zero()))
            .unwrap_or(DEFAULT_TIMEOUT);

        ChartSpec {
            release_name: self.release_name.clone(),
            chart_name: self.chart_name.clone(),
            version: self.version.clone(),
            namespace: self.namespace.clone(),
            repo_url: self.repo_url.clone(),
            create_namespace: self.create_namespace,
            atomic: self.atomic,
            wait: self.wait,
            wait_for_jobs: self.wait_for_jobs,
            upgrade_crds: self.upgrade_crds,
            timeout,
            set_vals: self.set_vals.clone(),
            set_file_vals: self.set_file_vals.clone(),
            set_json_vals: self.set_json_vals.clone(),
            values_files: self.values_files.clone(),
        }
    }
}

/// A chart descriptor with every default resolved, as handed to the Helm client
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub release_name: String,
    pub chart_name: String,
    pub version: Option<String>,
    pub namespace: String,
    pub repo_url: Option<String>,
    pub create_namespace: bool,
    pub atomic: bool,
    pub wait: bool,
    pub wait_for_jobs: bool,
    pub upgrade_crds: bool,
    pub timeout: Duration,
    pub set_vals: BTreeMap<String, String>,
    pub set_file_vals: BTreeMap<String, String>,
    pub set_json_vals: BTreeMap<String, String>,
    pub values_files: Vec<PathBuf>,
}

/// Connection settings a Helm client operates with
#[derive(Debug, Clone, PartialEq)]
pub struct HelmSettings {
    pub kubeconfig: PathBuf,
    pub kube_context: Option<String>,
    pub namespace: String,
}

/// Release object as reported by helm
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct HelmRelease {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub info: Option<HelmReleaseInfo>,
    #[serde(default)]
    pub chart: Option<HelmChart>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct HelmReleaseInfo {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub last_deployed: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct HelmChart {
    #[serde(default)]
    pub metadata: HelmChartMetadata,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct HelmChartMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, rename = "appVersion")]
    pub app_version: Option<String>,
}

/// Plain summary of an installed or upgraded release
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseInfo {
    pub name: String,
    pub namespace: String,
    pub revision: i64,
    pub status: String,
    pub chart: String,
    pub chart_version: String,
    pub app_version: String,
    pub last_deployed: Option<String>,
    pub notes: String,
}

impl From<HelmRelease> for ReleaseInfo {
    fn from(release: HelmRelease) -> Self {
        let info = release.info.unwrap_or_default();
        let metadata = release.chart.unwrap_or_default().metadata;

        ReleaseInfo {
            name: release.name,
            namespace: release.namespace,
            revision: release.version,
            status: info.status,
            chart: metadata.name,
            chart_version: metadata.version,
            app_version: metadata.app_version.unwrap_or_default(),
            last_deployed: info.last_deployed,
            notes: info.notes.unwrap_or_default(),
        }
    }
}

/// Operations the installers need from Helm.
///
/// `release_exists`, `install_chart` and `upgrade_chart` act on the namespace
/// of the current [`HelmSettings`]; `apply_settings` switches it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HelmClient: Send + Sync {
    /// Register a chart repository, overwriting an existing entry of the same name
    async fn add_repository(&self, repo: &RepoConfig) -> Result<()>;

    async fn release_exists(&self, release_name: &str) -> Result<bool>;

    async fn install_chart(&self, spec: &ChartSpec) -> Result<Option<HelmRelease>>;

    async fn upgrade_chart(&self, spec: &ChartSpec) -> Result<Option<HelmRelease>>;

    /// Remove a release; a release that does not exist is not an error
    async fn uninstall_release(&self, release_name: &str, namespace: &str) -> Result<()>;

    fn settings(&self) -> HelmSettings;

    /// Re-initialize the client with new settings. On error the previous
    /// settings stay in effect.
    async fn apply_settings(&self, settings: HelmSettings) -> Result<()>;
}

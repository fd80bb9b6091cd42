// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! [`HelmClient`] backed by the `helm` binary

use crate::constants::OPERATOR_NAME;
use crate::error::{AddonError, Result};
use crate::helm::{ChartSpec, HelmClient, HelmRelease, HelmSettings, RepoConfig};
use crate::kubernetes::create_client;
use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{
    api::{Patch, PatchParams},
    Api, Client, ResourceExt,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::{PoisonError, RwLock};
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Where the helm process writes its standard error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stderr {
    /// Share this process's stderr, so an active capture session collects it
    Inherit,
    /// Collect it for inspection
    Pipe,
}

/// Drives `helm` through subprocesses. Settings and the kube client used for
/// CRD upgrades are swapped together by [`HelmClient::apply_settings`].
pub struct HelmCli {
    binary: PathBuf,
    settings: RwLock<HelmSettings>,
    client: RwLock<Client>,
}

impl HelmCli {
    /// Create a client, validating the kubeconfig and context up front
    pub async fn connect(binary: impl Into<PathBuf>, settings: HelmSettings) -> Result<Self> {
        let client = create_client(&settings.kubeconfig, settings.kube_context.as_deref()).await?;

        Ok(Self {
            binary: binary.into(),
            settings: RwLock::new(settings),
            client: RwLock::new(client),
        })
    }

    fn kube_client(&self) -> Client {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn run(&self, command: &str, args: Vec<String>, stderr: Stderr) -> Result<Output> {
        let settings = self.settings();
        let mut cmd = Command::new(&self.binary);
        cmd.args(&args)
            .args(global_args(&settings))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(match stderr {
                Stderr::Inherit => Stdio::inherit(),
                Stderr::Pipe => Stdio::piped(),
            })
            .kill_on_drop(true);

        debug!("Running {} {}", self.binary.display(), args.join(" "));

        cmd.output().await.map_err(|e| AddonError::HelmCommand {
            command: command.to_string(),
            message: format!("failed to run {}: {}", self.binary.display(), e),
        })
    }

    async fn run_checked(
        &self,
        command: &str,
        args: Vec<String>,
        stderr: Stderr,
    ) -> Result<Output> {
        let output = self.run(command, args, stderr).await?;
        if !output.status.success() {
            return Err(command_failure(command, &output));
        }
        Ok(output)
    }

    async fn run_release(&self, command: &str, spec: &ChartSpec) -> Result<Option<HelmRelease>> {
        let namespace = self.settings().namespace;
        let output = self
            .run_checked(command, chart_args(command, spec, &namespace), Stderr::Inherit)
            .await?;
        parse_release(&output.stdout)
    }

    /// Server-side apply the chart's CRDs, which helm leaves alone on upgrade
    #[instrument(skip(self, spec), fields(chart = %spec.chart_name))]
    async fn apply_chart_crds(&self, spec: &ChartSpec) -> Result<()> {
        let output = self
            .run_checked("show crds", show_crds_args(spec), Stderr::Pipe)
            .await?;
        let crds = parse_crds(&String::from_utf8_lossy(&output.stdout))?;
        if crds.is_empty() {
            debug!("Chart ships no CRDs");
            return Ok(());
        }

        let api: Api<CustomResourceDefinition> = Api::all(self.kube_client());
        let pp = PatchParams::apply(OPERATOR_NAME).force();
        for crd in &crds {
            api.patch(&crd.name_any(), &pp, &Patch::Apply(crd)).await?;
        }

        info!("Applied {} CRDs", crds.len());
        Ok(())
    }
}

#[async_trait]
impl HelmClient for HelmCli {
    #[instrument(skip(self, repo), fields(repo = %repo.name))]
    async fn add_repository(&self, repo: &RepoConfig) -> Result<()> {
        if repo.is_oci() {
            debug!("OCI registry {} needs no repository entry", repo.url);
            return Ok(());
        }

        self.run_checked("repo add", repo_add_args(repo), Stderr::Inherit)
            .await?;
        Ok(())
    }

    async fn release_exists(&self, release_name: &str) -> Result<bool> {
        let namespace = self.settings().namespace;
        let args = vec![
            "status".to_string(),
            release_name.to_string(),
            "--namespace".to_string(),
            namespace,
            "--output".to_string(),
            "json".to_string(),
        ];

        let output = self.run("status", args, Stderr::Pipe).await?;
        if output.status.success() {
            return Ok(true);
        }
        if is_release_not_found(&String::from_utf8_lossy(&output.stderr)) {
            return Ok(false);
        }
        Err(command_failure("status", &output))
    }

    #[instrument(skip(self, spec), fields(release = %spec.release_name))]
    async fn install_chart(&self, spec: &ChartSpec) -> Result<Option<HelmRelease>> {
        self.run_release("install", spec).await
    }

    #[instrument(skip(self, spec), fields(release = %spec.release_name))]
    async fn upgrade_chart(&self, spec: &ChartSpec) -> Result<Option<HelmRelease>> {
        if spec.upgrade_crds {
            self.apply_chart_crds(spec).await?;
        }
        self.run_release("upgrade", spec).await
    }

    #[instrument(skip(self))]
    async fn uninstall_release(&self, release_name: &str, namespace: &str) -> Result<()> {
        let args = vec![
            "uninstall".to_string(),
            release_name.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--wait".to_string(),
        ];

        let output = self.run("uninstall", args, Stderr::Pipe).await?;
        if output.status.success() {
            info!("Uninstalled release {}/{}", namespace, release_name);
            return Ok(());
        }
        if is_release_not_found(&String::from_utf8_lossy(&output.stderr)) {
            debug!("Release {}/{} was not installed", namespace, release_name);
            return Ok(());
        }
        Err(command_failure("uninstall", &output))
    }

    fn settings(&self) -> HelmSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn apply_settings(&self, settings: HelmSettings) -> Result<()> {
        let client = create_client(&settings.kubeconfig, settings.kube_context.as_deref()).await?;

        *self.client.write().unwrap_or_else(PoisonError::into_inner) = client;
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
        Ok(())
    }
}

fn global_args(settings: &HelmSettings) -> Vec<String> {
    let mut args = vec![
        "--kubeconfig".to_string(),
        path_arg(&settings.kubeconfig),
    ];
    if let Some(context) = settings.kube_context.as_ref().filter(|c| !c.is_empty()) {
        args.push("--kube-context".to_string());
        args.push(context.clone());
    }
    args
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn repo_add_args(repo: &RepoConfig) -> Vec<String> {
    let mut args = vec![
        "repo".to_string(),
        "add".to_string(),
        repo.name.clone(),
        repo.url.clone(),
        "--force-update".to_string(),
    ];

    if let Some(username) = &repo.username {
        args.extend(["--username".to_string(), username.clone()]);
    }
    if let Some(password) = &repo.password {
        args.extend(["--password".to_string(), password.clone()]);
    }
    if let Some(ca_file) = &repo.ca_file {
        args.extend(["--ca-file".to_string(), path_arg(ca_file)]);
    }
    if let Some(cert_file) = &repo.cert_file {
        args.extend(["--cert-file".to_string(), path_arg(cert_file)]);
    }
    if let Some(key_file) = &repo.key_file {
        args.extend(["--key-file".to_string(), path_arg(key_file)]);
    }
    if repo.insecure_skip_tls_verify {
        args.push("--insecure-skip-tls-verify".to_string());
    }

    args
}

/// Chart reference plus `--version`/`--repo`, shared by install, upgrade and show
fn chart_source_args(spec: &ChartSpec) -> Vec<String> {
    let mut args = vec![spec.chart_name.clone()];

    if let Some(version) = &spec.version {
        args.extend(["--version".to_string(), version.clone()]);
    }
    // A bare chart name resolves against --repo instead of a registered alias.
    if let Some(repo_url) = &spec.repo_url {
        if !spec.chart_name.contains('/') {
            args.extend(["--repo".to_string(), repo_url.clone()]);
        }
    }

    args
}

fn chart_args(command: &str, spec: &ChartSpec, namespace: &str) -> Vec<String> {
    let mut args = vec![command.to_string(), spec.release_name.clone()];
    args.extend(chart_source_args(spec));
    args.extend([
        "--namespace".to_string(),
        namespace.to_string(),
        "--timeout".to_string(),
        format!("{}s", spec.timeout.as_secs()),
        "--output".to_string(),
        "json".to_string(),
    ]);

    if spec.create_namespace && command == "install" {
        args.push("--create-namespace".to_string());
    }
    if spec.atomic {
        args.push("--atomic".to_string());
    }
    if spec.wait {
        args.push("--wait".to_string());
        if spec.wait_for_jobs {
            args.push("--wait-for-jobs".to_string());
        }
    }

    for file in &spec.values_files {
        args.extend(["--values".to_string(), path_arg(file)]);
    }
    for (key, value) in &spec.set_vals {
        args.extend(["--set".to_string(), format!("{}={}", key, value)]);
    }
    for (key, path) in &spec.set_file_vals {
        args.extend(["--set-file".to_string(), format!("{}={}", key, path)]);
    }
    for (key, json) in &spec.set_json_vals {
        args.extend(["--set-json".to_string(), format!("{}={}", key, json)]);
    }

    args
}

fn show_crds_args(spec: &ChartSpec) -> Vec<String> {
    let mut args = vec!["show".to_string(), "crds".to_string()];
    args.extend(chart_source_args(spec));
    args
}

fn is_release_not_found(stderr: &str) -> bool {
    stderr.to_lowercase().contains("release: not found")
}

fn command_failure(command: &str, output: &Output) -> AddonError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = match stderr.trim() {
        "" => output.status.to_string(),
        text => text.to_string(),
    };

    AddonError::HelmCommand {
        command: command.to_string(),
        message,
    }
}

fn parse_release(stdout: &[u8]) -> Result<Option<HelmRelease>> {
    let text = String::from_utf8_lossy(stdout);
    if text.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(text.trim())
        .map(Some)
        .map_err(|e| AddonError::ParseError(format!("release JSON: {}", e)))
}

fn parse_crds(yaml: &str) -> Result<Vec<CustomResourceDefinition>> {
    let mut crds = Vec::new();

    for document in serde_yaml::Deserializer::from_str(yaml) {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| AddonError::ParseError(format!("CRD YAML: {}", e)))?;
        if value.is_null() {
            continue;
        }

        let crd = serde_yaml::from_value(value)
            .map_err(|e| AddonError::ParseError(format!("CRD YAML: {}", e)))?;
        crds.push(crd);
    }

    Ok(crds)
}

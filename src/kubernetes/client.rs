// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! REST config and client creation from a kubeconfig file

use crate::error::{AddonError, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use std::path::Path;
use tracing::{debug, instrument};

/// Build a REST config from a kubeconfig path and optional context name.
/// An empty path is rejected with [`AddonError::EmptyKubeconfigPath`].
#[instrument]
pub async fn build_rest_config(kubeconfig_path: &Path, context: Option<&str>) -> Result<KConfig> {
    if kubeconfig_path.as_os_str().is_empty() {
        return Err(AddonError::EmptyKubeconfigPath);
    }

    let kubeconfig = Kubeconfig::read_from(kubeconfig_path).map_err(|e| {
        AddonError::KubeconfigError(format!(
            "Failed to read kubeconfig {}: {}",
            kubeconfig_path.display(),
            e
        ))
    })?;

    let options = KubeConfigOptions {
        context: context.filter(|c| !c.is_empty()).map(str::to_string),
        ..Default::default()
    };

    let config = KConfig::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| AddonError::KubeconfigError(format!("Failed to create config: {}", e)))?;

    debug!("Loaded REST config for {}", config.cluster_url);
    Ok(config)
}

/// Create a Kubernetes client from a kubeconfig path and optional context name
pub async fn create_client(kubeconfig_path: &Path, context: Option<&str>) -> Result<Client> {
    let config = build_rest_config(kubeconfig_path, context).await?;

    Client::try_from(config)
        .map_err(|e| AddonError::KubeconfigError(format!("Failed to create client: {}", e)))
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deployment and DaemonSet readiness probes

use crate::error::{AddonError, Result};
use crate::readiness::poll::poll_for_readiness;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use kube::{Api, Client};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

/// A Deployment is ready once every desired replica is both updated and available.
pub fn deployment_is_ready(deployment: &Deployment) -> bool {
    let Some(status) = deployment.status.as_ref() else {
        return false;
    };

    let replicas = status.replicas.unwrap_or(0);
    if replicas == 0 {
        return false;
    }

    status.updated_replicas.unwrap_or(0) >= replicas
        && status.available_replicas.unwrap_or(0) >= replicas
}

/// A DaemonSet is ready once it is scheduled somewhere, fully updated and has no unavailable pods.
pub fn daemonset_is_ready(daemonset: &DaemonSet) -> bool {
    let Some(status) = daemonset.status.as_ref() else {
        return false;
    };

    status.desired_number_scheduled > 0
        && status.number_unavailable.unwrap_or(0) == 0
        && status.updated_number_scheduled.unwrap_or(0) == status.desired_number_scheduled
}

/// Fetch a resource, mapping 404 to `None` so callers can keep polling.
async fn get_tolerating_not_found<K>(api: &Api<K>, name: &str) -> Result<Option<K>>
where
    K: Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(err)) if err.code == 404 => {
            trace!("{} not found yet", name);
            Ok(None)
        }
        Err(e) => Err(AddonError::KubeError(e)),
    }
}

/// Wait for a Deployment to roll out completely
#[instrument(skip(client, cancel))]
pub async fn wait_for_deployment_ready(
    client: &Client,
    namespace: &str,
    name: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);

    poll_for_readiness(timeout, cancel, || {
        let deployments = deployments.clone();
        let name = name.to_string();
        async move {
            let ready = get_tolerating_not_found(&deployments, &name)
                .await?
                .is_some_and(|d| deployment_is_ready(&d));
            Ok(ready)
        }
    })
    .await?;

    debug!("Deployment {}/{} is ready", namespace, name);
    Ok(())
}

/// Wait for a DaemonSet to be scheduled and available on every target node
#[instrument(skip(client, cancel))]
pub async fn wait_for_daemonset_ready(
    client: &Client,
    namespace: &str,
    name: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let daemonsets: Api<DaemonSet> = Api::namespaced(client.clone(), namespace);

    poll_for_readiness(timeout, cancel, || {
        let daemonsets = daemonsets.clone();
        let name = name.to_string();
        async move {
            let ready = get_tolerating_not_found(&daemonsets, &name)
                .await?
                .is_some_and(|d| daemonset_is_ready(&d));
            Ok(ready)
        }
    })
    .await?;

    debug!("DaemonSet {}/{} is ready", namespace, name);
    Ok(())
}

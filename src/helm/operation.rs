// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Repository registration followed by install-or-upgrade of one release

use crate::constants::helm::TIMEOUT_GRACE;
use crate::error::{AddonError, Result};
use crate::helm::{
    ChartConfig, ChartSpec, HelmClient, HelmRelease, HelmSettings, ReleaseInfo, RepoConfig,
};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Add `repo`, then install `chart` if no release exists yet or upgrade it otherwise.
///
/// `timeout` is used when the chart sets none. A missing release object from
/// the client is returned as `Ok(None)`. A cancelled token stops the helm call
/// with [`AddonError::Cancelled`], after the client namespace is restored.
#[instrument(
    skip(helm, repo, chart, timeout, cancel),
    fields(release = %chart.release_name, chart = %chart.chart_name)
)]
pub async fn install_or_upgrade(
    helm: &dyn HelmClient,
    repo: &RepoConfig,
    chart: &ChartConfig,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Option<ReleaseInfo>> {
    until_cancelled(cancel, "install", add_repository(helm, repo)).await?;

    let spec = chart.to_spec(timeout);
    let operation = until_cancelled(cancel, "install", run_chart(helm, &spec));
    let release = in_namespace(helm, &spec.namespace, operation).await?;

    Ok(release.map(ReleaseInfo::from))
}

/// Race `operation` against the token. Dropping the operation kills any
/// helm subprocess it started.
pub(crate) async fn until_cancelled<T>(
    cancel: &CancellationToken,
    what: &str,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AddonError::Cancelled(what.to_string())),
        result = operation => result,
    }
}

async fn add_repository(helm: &dyn HelmClient, repo: &RepoConfig) -> Result<()> {
    let wrap = |e: AddonError| AddonError::RepositoryAdd {
        repo: repo.repo_name.clone(),
        source: Box::new(e),
    };

    repo.validate().map_err(wrap)?;
    helm.add_repository(repo).await.map_err(wrap)?;

    debug!("Repository {} registered at {}", repo.name, repo.url);
    Ok(())
}

/// Run `operation` with the client switched to `namespace`, restoring the
/// previous settings once it completes. No switch happens when the namespace
/// is empty or already active. Dropping the returned future mid-operation
/// skips the restore, so callers cancel through `operation` instead.
async fn in_namespace<T, Fut>(helm: &dyn HelmClient, namespace: &str, operation: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    let original = helm.settings();
    if namespace.is_empty() || namespace == original.namespace {
        return operation.await;
    }

    switch_namespace(helm, &original, namespace).await?;
    let result = operation.await;

    if let Err(e) = helm.apply_settings(original.clone()).await {
        warn!(
            "Failed to restore helm namespace {}: {}",
            original.namespace, e
        );
    }

    result
}

async fn switch_namespace(
    helm: &dyn HelmClient,
    original: &HelmSettings,
    namespace: &str,
) -> Result<()> {
    debug!(
        "Switching helm namespace from {} to {}",
        original.namespace, namespace
    );

    let target = HelmSettings {
        namespace: namespace.to_string(),
        ..original.clone()
    };

    if let Err(e) = helm.apply_settings(target).await {
        if let Err(rollback) = helm.apply_settings(original.clone()).await {
            warn!(
                "Failed to roll back helm namespace to {}: {}",
                original.namespace, rollback
            );
        }
        return Err(AddonError::NamespaceSwitch {
            namespace: namespace.to_string(),
            source: Box::new(e),
        });
    }

    Ok(())
}

/// Probe for the release and install or upgrade it, all within the chart
/// timeout plus [`TIMEOUT_GRACE`].
async fn run_chart(helm: &dyn HelmClient, spec: &ChartSpec) -> Result<Option<HelmRelease>> {
    let wrap = |e: AddonError| AddonError::ChartInstall {
        chart: spec.chart_name.clone(),
        source: Box::new(e),
    };
    let bound = spec.timeout + TIMEOUT_GRACE;

    let call = async {
        let exists = helm.release_exists(&spec.release_name).await?;
        let command = if exists { "upgrade" } else { "install" };
        info!(
            "Running helm {} for release {} ({})",
            command, spec.release_name, spec.chart_name
        );

        if exists {
            helm.upgrade_chart(spec).await
        } else {
            helm.install_chart(spec).await
        }
    };

    let release = tokio::time::timeout(bound, call)
        .await
        .map_err(|_| {
            wrap(AddonError::HelmTimeout {
                command: "install or upgrade".to_string(),
                timeout: bound,
            })
        })?
        .map_err(wrap)?;

    if let Some(release) = release.as_ref() {
        info!(
            "Release {} at revision {} in namespace {}",
            release.name, release.version, release.namespace
        );
    }

    Ok(release)
}

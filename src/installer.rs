// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-component install, uninstall and readiness orchestration

use crate::capture::with_captured_stderr;
use crate::components::AddonDefinition;
use crate::error::{AddonError, Result};
use crate::helm::operation::until_cancelled;
use crate::helm::{install_or_upgrade, HelmClient};
use crate::kubernetes::create_client;
use crate::readiness::{wait_for_resources, ReadinessCheck};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Strategy used by [`ComponentInstaller::wait_for_readiness`]
pub type WaitForReadinessFn =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Minimal capability every add-on installer provides
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(&self, cancel: &CancellationToken) -> Result<()>;

    async fn uninstall(&self, cancel: &CancellationToken) -> Result<()>;
}

/// Installs one add-on through Helm and waits for its workloads.
///
/// Holds no state about the release itself; calling `install` twice converges
/// through install-or-upgrade. Calls into one instance must not overlap.
pub struct ComponentInstaller {
    addon: AddonDefinition,
    helm: Arc<dyn HelmClient>,
    timeout: Duration,
    capture_stderr: bool,
    default_wait: WaitForReadinessFn,
    wait: WaitForReadinessFn,
}

impl ComponentInstaller {
    pub fn new(
        addon: AddonDefinition,
        helm: Arc<dyn HelmClient>,
        kubeconfig: PathBuf,
        context: Option<String>,
        timeout: Duration,
    ) -> Self {
        let default_wait = default_wait_fn(
            kubeconfig,
            context,
            addon.readiness_checks.clone(),
            timeout,
        );

        Self {
            addon,
            helm,
            timeout,
            capture_stderr: false,
            wait: default_wait.clone(),
            default_wait,
        }
    }

    /// Route stderr written during `install` into the returned error instead
    /// of the terminal. All capturing installers serialize on one global lock.
    pub fn with_stderr_capture(mut self, enabled: bool) -> Self {
        self.capture_stderr = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.addon.name
    }

    /// Wait until every readiness check of this component passes, sharing the
    /// installer timeout across all of them.
    #[instrument(skip(self, cancel), fields(component = %self.addon.name))]
    pub async fn wait_for_readiness(&self, cancel: &CancellationToken) -> Result<()> {
        (self.wait)(cancel.clone())
            .await
            .map_err(|e| self.wrap("wait for", e))?;

        info!("{} is ready", self.addon.name);
        Ok(())
    }

    /// Replace the readiness strategy. `None` restores the built-in one.
    pub fn set_wait_for_readiness_func(&mut self, wait: Option<WaitForReadinessFn>) {
        self.wait = wait.unwrap_or_else(|| self.default_wait.clone());
    }

    pub fn wait_for_readiness_func(&self) -> WaitForReadinessFn {
        self.wait.clone()
    }

    fn wrap(&self, action: &'static str, source: AddonError) -> AddonError {
        AddonError::Component {
            action,
            component: self.addon.name.clone(),
            source: Box::new(source),
        }
    }
}

#[async_trait]
impl Installer for ComponentInstaller {
    #[instrument(skip(self, cancel), fields(component = %self.addon.name))]
    async fn install(&self, cancel: &CancellationToken) -> Result<()> {
        let operation = install_or_upgrade(
            self.helm.as_ref(),
            &self.addon.repo,
            &self.addon.chart,
            self.timeout,
            cancel,
        );

        // Cancellation is handled inside the operation so the helm namespace
        // is restored before it returns.
        let release = if self.capture_stderr {
            with_captured_stderr(operation).await
        } else {
            operation.await
        }
        .map_err(|e| self.wrap("install", e))?;

        match release {
            Some(release) => info!(
                "Installed {} ({} {}) revision {}",
                self.addon.name, release.chart, release.chart_version, release.revision
            ),
            None => info!("Installed {}", self.addon.name),
        }
        Ok(())
    }

    #[instrument(skip(self, cancel), fields(component = %self.addon.name))]
    async fn uninstall(&self, cancel: &CancellationToken) -> Result<()> {
        let chart = &self.addon.chart;
        let operation = self
            .helm
            .uninstall_release(&chart.release_name, &chart.namespace);

        until_cancelled(cancel, "uninstall", operation)
            .await
            .map_err(|e| self.wrap("uninstall", e))?;

        info!("Uninstalled {}", self.addon.name);
        Ok(())
    }
}

fn default_wait_fn(
    kubeconfig: PathBuf,
    context: Option<String>,
    checks: Vec<ReadinessCheck>,
    timeout: Duration,
) -> WaitForReadinessFn {
    let checks = Arc::new(checks);

    Arc::new(move |cancel: CancellationToken| {
        let kubeconfig = kubeconfig.clone();
        let context = context.clone();
        let checks = checks.clone();

        async move {
            if checks.is_empty() {
                return Ok(());
            }
            let client = create_client(&kubeconfig, context.as_deref()).await?;
            wait_for_resources(&client, &checks, timeout, &cancel).await
        }
        .boxed()
    })
}

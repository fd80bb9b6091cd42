// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use addonctl::components::{self, NAMES};
use addonctl::config::Config;
use addonctl::constants::helm::DEFAULT_NAMESPACE;
use addonctl::helm::{HelmCli, HelmSettings};
use addonctl::installer::{ComponentInstaller, Installer};

const USAGE: &str = "usage: addonctl <install|uninstall|wait> <component>";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stdout)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [action, component] = args.as_slice() else {
        bail!("{}", USAGE);
    };
    let addon = components::lookup(component).with_context(|| {
        format!(
            "unknown component {}, expected one of: {}",
            component,
            NAMES.join(", ")
        )
    })?;

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: kubeconfig={}, context={:?}, timeout={:?}",
        config.kubeconfig.display(),
        config.context,
        config.timeout
    );

    let helm = HelmCli::connect(
        &config.helm_binary,
        HelmSettings {
            kubeconfig: config.kubeconfig.clone(),
            kube_context: config.context.clone(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        },
    )
    .await?;
    info!("Connected to Kubernetes cluster");

    let installer = ComponentInstaller::new(
        addon,
        Arc::new(helm),
        config.kubeconfig.clone(),
        config.context.clone(),
        config.timeout,
    )
    .with_stderr_capture(config.capture_stderr);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    match action.as_str() {
        "install" => {
            installer.install(&cancel).await?;
            installer.wait_for_readiness(&cancel).await?;
            info!("{} installed and ready", installer.name());
        }
        "uninstall" => {
            installer.uninstall(&cancel).await?;
            info!("{} uninstalled", installer.name());
        }
        "wait" => {
            installer.wait_for_readiness(&cancel).await?;
            info!("{} is ready", installer.name());
        }
        _ => bail!("unknown action {}\n{}", action, USAGE),
    }

    Ok(())
}

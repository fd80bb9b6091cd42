// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::helm::{DEFAULT_BINARY, DEFAULT_TIMEOUT};
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub kubeconfig: PathBuf,
    /// Kubeconfig context; the current context when unset
    pub context: Option<String>,
    /// Budget for helm operations and for readiness, each
    pub timeout: Duration,
    pub helm_binary: PathBuf,
    /// Fold helm's stderr into install errors instead of printing it
    pub capture_stderr: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let kubeconfig = match lookup("KUBECONFIG").filter(|v| !v.is_empty()) {
            // Only the first entry of a path list is used.
            Some(paths) => PathBuf::from(paths.split(':').next().unwrap_or_default()),
            None => {
                let home = lookup("HOME").context("neither KUBECONFIG nor HOME is set")?;
                PathBuf::from(home).join(".kube").join("config")
            }
        };

        let context = lookup("ADDONCTL_CONTEXT").filter(|v| !v.is_empty());

        let timeout = match lookup("ADDONCTL_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse()
                    .with_context(|| format!("ADDONCTL_TIMEOUT_SECS is not a number: {}", secs))?,
            ),
            None => DEFAULT_TIMEOUT,
        };

        let helm_binary = lookup("ADDONCTL_HELM_BIN")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BINARY));

        let capture_stderr = match lookup("ADDONCTL_CAPTURE_STDERR") {
            Some(v) => v
                .parse()
                .with_context(|| format!("ADDONCTL_CAPTURE_STDERR must be true or false: {}", v))?,
            None => true,
        };

        Ok(Config {
            kubeconfig,
            context,
            timeout,
            helm_binary,
            capture_stderr,
        })
    }
}

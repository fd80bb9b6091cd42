// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::readiness::ReadinessCheck;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AddonError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("kubeconfig path is empty")]
    EmptyKubeconfigPath,

    #[error("Failed to load kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("unknown readiness check type: {0}")]
    UnknownCheckKind(String),

    #[error("poll timed out")]
    PollTimedOut,

    #[error("readiness probe failed: {0}")]
    ProbeFailed(#[source] Box<AddonError>),

    #[error("timeout exceeded before checking {check}")]
    BudgetExhausted { check: ReadinessCheck },

    #[error("{check} not ready: {source}")]
    ResourceNotReady {
        check: ReadinessCheck,
        #[source]
        source: Box<AddonError>,
    },

    #[error("invalid repository {name}: {message}")]
    InvalidRepository { name: String, message: String },

    #[error("failed to add {repo} repository: {source}")]
    RepositoryAdd {
        repo: String,
        #[source]
        source: Box<AddonError>,
    },

    #[error("failed to switch helm namespace to {namespace}: {source}")]
    NamespaceSwitch {
        namespace: String,
        #[source]
        source: Box<AddonError>,
    },

    #[error("failed to install or upgrade chart {chart}: {source}")]
    ChartInstall {
        chart: String,
        #[source]
        source: Box<AddonError>,
    },

    #[error("helm {command} failed: {message}")]
    HelmCommand { command: String, message: String },

    #[error("helm {command} did not finish within {timeout:?}")]
    HelmTimeout {
        command: String,
        timeout: std::time::Duration,
    },

    #[error("failed to {action} {component}: {source}")]
    Component {
        action: &'static str,
        component: String,
        #[source]
        source: Box<AddonError>,
    },

    #[error("{0} cancelled")]
    Cancelled(String),

    #[error("{source}\n{output}")]
    Captured {
        #[source]
        source: Box<AddonError>,
        output: String,
    },

    #[error("stderr capture failed: {0}")]
    CaptureError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse helm output: {0}")]
    ParseError(String),
}

impl AddonError {
    /// Whether this error, or anything it wraps, is a readiness or helm timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            AddonError::PollTimedOut
            | AddonError::BudgetExhausted { .. }
            | AddonError::HelmTimeout { .. } => true,
            AddonError::ProbeFailed(source) => source.is_timeout(),
            AddonError::ResourceNotReady { source, .. }
            | AddonError::RepositoryAdd { source, .. }
            | AddonError::NamespaceSwitch { source, .. }
            | AddonError::ChartInstall { source, .. }
            | AddonError::Component { source, .. }
            | AddonError::Captured { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AddonError>;

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster-observed readiness: polling, per-resource probes and budgeted coordination.

pub mod checks;
pub mod coordinator;
pub mod poll;

use crate::error::AddonError;
use std::fmt;
use std::str::FromStr;

pub use checks::{
    daemonset_is_ready, deployment_is_ready, wait_for_daemonset_ready, wait_for_deployment_ready,
};
pub use coordinator::wait_for_resources;
pub use poll::poll_for_readiness;

/// Kind of workload a readiness check targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadinessCheckKind {
    Deployment,
    DaemonSet,
}

impl ReadinessCheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadinessCheckKind::Deployment => "deployment",
            ReadinessCheckKind::DaemonSet => "daemonset",
        }
    }
}

impl fmt::Display for ReadinessCheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadinessCheckKind {
    type Err = AddonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deployment" => Ok(ReadinessCheckKind::Deployment),
            "daemonset" => Ok(ReadinessCheckKind::DaemonSet),
            other => Err(AddonError::UnknownCheckKind(other.to_string())),
        }
    }
}

/// A single workload that must converge before a component counts as ready
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadinessCheck {
    pub kind: ReadinessCheckKind,
    pub namespace: String,
    pub name: String,
}

impl ReadinessCheck {
    pub fn new(kind: ReadinessCheckKind, namespace: &str, name: &str) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn deployment(namespace: &str, name: &str) -> Self {
        Self::new(ReadinessCheckKind::Deployment, namespace, name)
    }

    pub fn daemonset(namespace: &str, name: &str) -> Self {
        Self::new(ReadinessCheckKind::DaemonSet, namespace, name)
    }

    /// Build a check from a textual kind such as `"deployment"`.
    /// Unknown kinds are rejected here rather than when the check runs.
    pub fn parse(kind: &str, namespace: &str, name: &str) -> crate::error::Result<Self> {
        Ok(Self::new(kind.parse()?, namespace, name))
    }
}

impl fmt::Display for ReadinessCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

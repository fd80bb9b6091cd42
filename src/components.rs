// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Built-in add-on definitions

use crate::helm::{ChartConfig, RepoConfig};
use crate::readiness::ReadinessCheck;

/// Everything needed to install and verify one add-on
#[derive(Debug, Clone, PartialEq)]
pub struct AddonDefinition {
    pub name: String,
    pub repo: RepoConfig,
    pub chart: ChartConfig,
    /// Workloads that must converge, checked in this order
    pub readiness_checks: Vec<ReadinessCheck>,
}

/// Names accepted by [`lookup`]
pub const NAMES: &[&str] = &["cilium", "calico", "metrics-server", "ingress-nginx", "argocd"];

pub fn lookup(name: &str) -> Option<AddonDefinition> {
    match name {
        "cilium" => Some(cilium()),
        "calico" => Some(calico()),
        "metrics-server" => Some(metrics_server()),
        "ingress-nginx" => Some(ingress_nginx()),
        "argocd" => Some(argocd()),
        _ => None,
    }
}

pub fn cilium() -> AddonDefinition {
    AddonDefinition {
        name: "cilium".to_string(),
        repo: RepoConfig::new("cilium", "https://helm.cilium.io", "cilium"),
        chart: ChartConfig::new("cilium", "cilium/cilium", "kube-system")
            .with_value("operator.replicas", "1"),
        readiness_checks: vec![
            ReadinessCheck::daemonset("kube-system", "cilium"),
            ReadinessCheck::deployment("kube-system", "cilium-operator"),
        ],
    }
}

pub fn calico() -> AddonDefinition {
    AddonDefinition {
        name: "calico".to_string(),
        repo: RepoConfig::new(
            "projectcalico",
            "https://docs.tigera.io/calico/charts",
            "calico",
        ),
        chart: ChartConfig::new("calico", "projectcalico/tigera-operator", "tigera-operator"),
        readiness_checks: vec![
            ReadinessCheck::deployment("tigera-operator", "tigera-operator"),
            ReadinessCheck::daemonset("calico-system", "calico-node"),
            ReadinessCheck::deployment("calico-system", "calico-kube-controllers"),
        ],
    }
}

pub fn metrics_server() -> AddonDefinition {
    AddonDefinition {
        name: "metrics-server".to_string(),
        repo: RepoConfig::new(
            "metrics-server",
            "https://kubernetes-sigs.github.io/metrics-server/",
            "metrics-server",
        ),
        chart: ChartConfig::new("metrics-server", "metrics-server/metrics-server", "kube-system")
            .with_json_value("args", r#"["--kubelet-insecure-tls"]"#),
        readiness_checks: vec![ReadinessCheck::deployment("kube-system", "metrics-server")],
    }
}

pub fn ingress_nginx() -> AddonDefinition {
    AddonDefinition {
        name: "ingress-nginx".to_string(),
        repo: RepoConfig::new(
            "ingress-nginx",
            "https://kubernetes.github.io/ingress-nginx",
            "ingress-nginx",
        ),
        chart: ChartConfig::new("ingress-nginx", "ingress-nginx/ingress-nginx", "ingress-nginx"),
        readiness_checks: vec![ReadinessCheck::deployment(
            "ingress-nginx",
            "ingress-nginx-controller",
        )],
    }
}

pub fn argocd() -> AddonDefinition {
    let mut chart = ChartConfig::new("argocd", "argo/argo-cd", "argocd");
    chart.wait_for_jobs = true;

    AddonDefinition {
        name: "argocd".to_string(),
        repo: RepoConfig::new("argo", "https://argoproj.github.io/argo-helm", "argocd"),
        chart,
        readiness_checks: vec![
            ReadinessCheck::deployment("argocd", "argocd-server"),
            ReadinessCheck::deployment("argocd", "argocd-repo-server"),
            ReadinessCheck::deployment("argocd", "argocd-redis"),
        ],
    }
}

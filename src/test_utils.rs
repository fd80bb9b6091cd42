// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking Kubernetes API responses, Helm and stderr.

use crate::error;
use crate::helm::{ChartSpec, HelmClient, HelmRelease, HelmSettings, RepoConfig};
use async_trait::async_trait;
use http::{Request, Response};
use kube::client::Body;
use kube::Client;
use nix::libc::STDERR_FILENO;
use nix::sys::stat::fstat;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

/// A mock HTTP service that returns predefined responses based on request paths
/// and records every request it serves.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(("GET".to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Build a kube Client from this mock service. The service stays usable
    /// through clones for inspecting recorded requests.
    pub fn client(&self) -> Client {
        Client::new(self.clone(), "default")
    }

    /// Paths of all GET requests served so far, in order
    pub fn get_paths(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == "GET")
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();
        responses
            .get(&(method.to_string(), path.to_string()))
            .cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        self.requests
            .lock()
            .unwrap()
            .push((method.clone(), path.clone()));
        let response = self.find_response(&method, &path);

        Box::pin(async move {
            let (status, body) =
                response.unwrap_or_else(|| (404, not_found_json("resource", "unknown")));
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

pub fn deployment_path(namespace: &str, name: &str) -> String {
    format!("/apis/apps/v1/namespaces/{}/deployments/{}", namespace, name)
}

pub fn daemonset_path(namespace: &str, name: &str) -> String {
    format!("/apis/apps/v1/namespaces/{}/daemonsets/{}", namespace, name)
}

/// Create a mock Deployment JSON response with the given status counters
pub fn deployment_json(name: &str, replicas: i32, updated: i32, available: i32) -> String {
    serde_json::json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": name },
        "spec": {
            "selector": { "matchLabels": { "app": name } },
            "template": { "metadata": { "labels": { "app": name } } }
        },
        "status": {
            "replicas": replicas,
            "updatedReplicas": updated,
            "availableReplicas": available
        }
    })
    .to_string()
}

/// Create a mock DaemonSet JSON response with the given status counters
pub fn daemonset_json(name: &str, desired: i32, unavailable: i32, updated: i32) -> String {
    serde_json::json!({
        "apiVersion": "apps/v1",
        "kind": "DaemonSet",
        "metadata": { "name": name },
        "spec": {
            "selector": { "matchLabels": { "app": name } },
            "template": { "metadata": { "labels": { "app": name } } }
        },
        "status": {
            "currentNumberScheduled": desired,
            "desiredNumberScheduled": desired,
            "numberMisscheduled": 0,
            "numberReady": desired - unavailable,
            "numberUnavailable": unavailable,
            "updatedNumberScheduled": updated
        }
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// Create a 403 forbidden response
pub fn forbidden_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" is forbidden", resource, name),
        "reason": "Forbidden",
        "code": 403
    })
    .to_string()
}

/// Held by every test that redirects fd 2 or compares its identity.
pub static STDERR_SERIAL: LazyLock<tokio::sync::Mutex<()>> =
    LazyLock::new(|| tokio::sync::Mutex::new(()));

/// Device and inode of whatever fd 2 currently points at
pub fn stderr_identity() -> (u64, u64) {
    let stat = fstat(STDERR_FILENO).unwrap();
    (stat.st_dev as u64, stat.st_ino as u64)
}

/// Write straight to fd 2, bypassing the test harness output capture
pub fn write_stderr(text: &str) {
    let mut stderr = io::stderr();
    stderr.write_all(text.as_bytes()).unwrap();
    stderr.flush().unwrap();
}

/// Which [`FakeHelm`] call never returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stall {
    Nothing,
    Status,
    Install,
}

/// Helm client that tracks its namespace and can hang on one call.
/// Releases never exist, so every chart run is an install.
pub struct FakeHelm {
    settings: Mutex<HelmSettings>,
    applied: Mutex<Vec<String>>,
    stall: Stall,
}

impl FakeHelm {
    pub fn new(namespace: &str, stall: Stall) -> Self {
        Self {
            settings: Mutex::new(HelmSettings {
                kubeconfig: PathBuf::from("/tmp/kubeconfig"),
                kube_context: None,
                namespace: namespace.to_string(),
            }),
            applied: Mutex::new(Vec::new()),
            stall,
        }
    }

    /// Namespaces passed to `apply_settings`, in order
    pub fn applied_namespaces(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }

    async fn maybe_stall(&self, call: Stall) {
        if self.stall == call {
            tokio::time::sleep(Duration::from_secs(86400)).await;
        }
    }
}

#[async_trait]
impl HelmClient for FakeHelm {
    async fn add_repository(&self, _repo: &RepoConfig) -> error::Result<()> {
        Ok(())
    }

    async fn release_exists(&self, _release_name: &str) -> error::Result<bool> {
        self.maybe_stall(Stall::Status).await;
        Ok(false)
    }

    async fn install_chart(&self, _spec: &ChartSpec) -> error::Result<Option<HelmRelease>> {
        self.maybe_stall(Stall::Install).await;
        Ok(None)
    }

    async fn upgrade_chart(&self, _spec: &ChartSpec) -> error::Result<Option<HelmRelease>> {
        Ok(None)
    }

    async fn uninstall_release(&self, _release_name: &str, _namespace: &str) -> error::Result<()> {
        Ok(())
    }

    fn settings(&self) -> HelmSettings {
        self.settings.lock().unwrap().clone()
    }

    async fn apply_settings(&self, settings: HelmSettings) -> error::Result<()> {
        self.applied.lock().unwrap().push(settings.namespace.clone());
        *self.settings.lock().unwrap() = settings;
        Ok(())
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes client creation from kubeconfig files.

pub mod client;

pub use client::{build_rest_config, create_client};

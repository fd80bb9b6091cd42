// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// The field manager name used for server-side apply
pub const OPERATOR_NAME: &str = "addonctl";

/// Readiness polling configuration
pub mod readiness {
    use std::time::Duration;

    /// Fixed interval between readiness probe invocations
    pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
}

/// Helm invocation defaults
pub mod helm {
    use std::time::Duration;

    /// Timeout applied to install/upgrade when neither chart nor installer sets one
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
    /// Extra time granted to the helm process beyond its own `--timeout`
    pub const TIMEOUT_GRACE: Duration = Duration::from_secs(30);
    /// Namespace helm targets when none is configured
    pub const DEFAULT_NAMESPACE: &str = "default";
    /// Binary invoked by the CLI client
    pub const DEFAULT_BINARY: &str = "helm";
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Sequential readiness checks sharing one timeout budget

use crate::error::{AddonError, Result};
use crate::readiness::checks::{wait_for_daemonset_ready, wait_for_deployment_ready};
use crate::readiness::{ReadinessCheck, ReadinessCheckKind};
use kube::Client;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Run every check in list order against a single budget.
///
/// Each check gets whatever is left of `total_timeout`, so a slow early check
/// can starve later ones. The first failure aborts the remaining checks.
#[instrument(skip(client, checks, cancel), fields(checks = checks.len()))]
pub async fn wait_for_resources(
    client: &Client,
    checks: &[ReadinessCheck],
    total_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let start = Instant::now();

    for check in checks {
        let remaining = total_timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            return Err(AddonError::BudgetExhausted {
                check: check.clone(),
            });
        }

        info!("Waiting for {} (up to {:?})", check, remaining);

        let outcome = match check.kind {
            ReadinessCheckKind::Deployment => {
                wait_for_deployment_ready(client, &check.namespace, &check.name, remaining, cancel)
                    .await
            }
            ReadinessCheckKind::DaemonSet => {
                wait_for_daemonset_ready(client, &check.namespace, &check.name, remaining, cancel)
                    .await
            }
        };

        outcome.map_err(|e| AddonError::ResourceNotReady {
            check: check.clone(),
            source: Box::new(e),
        })?;
    }

    Ok(())
}

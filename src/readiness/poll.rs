// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Fixed-interval readiness polling

use crate::constants::readiness::POLL_INTERVAL;
use crate::error::{AddonError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Poll `probe` until it reports ready, the timeout elapses or it fails.
///
/// The first probe runs immediately; later ones run every [`POLL_INTERVAL`].
/// `Ok(false)` keeps polling, `Err` aborts at once without retrying. Both an
/// elapsed timeout and a cancelled token yield [`AddonError::PollTimedOut`].
pub async fn poll_for_readiness<F, Fut>(
    timeout: Duration,
    cancel: &CancellationToken,
    probe: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    poll_with_interval(timeout, POLL_INTERVAL, cancel, probe).await
}

pub(crate) async fn poll_with_interval<F, Fut>(
    timeout: Duration,
    poll_interval: Duration,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + timeout;
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // The first tick completes immediately.
        tokio::select! {
            biased;
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => {
                debug!("Readiness polling cancelled");
                return Err(AddonError::PollTimedOut);
            }
            _ = sleep_until(deadline) => return Err(AddonError::PollTimedOut),
        }

        let outcome = tokio::select! {
            biased;
            outcome = probe() => outcome,
            _ = cancel.cancelled() => {
                debug!("Readiness polling cancelled during probe");
                return Err(AddonError::PollTimedOut);
            }
            _ = sleep_until(deadline) => return Err(AddonError::PollTimedOut),
        };

        match outcome {
            Ok(true) => return Ok(()),
            Ok(false) => trace!("Readiness condition not yet met, polling again"),
            Err(e) => return Err(AddonError::ProbeFailed(Box::new(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_probe_returns_without_delay() {
        let start = Instant::now();
        let cancel = CancellationToken::new();

        poll_for_readiness(Duration::from_secs(60), &cancel, || async { Ok(true) })
            .await
            .unwrap();

        assert!(start.elapsed() < POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_a_few_probes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let counter = calls.clone();

        poll_for_readiness(Duration::from_secs(60), &cancel, move || {
            let counter = counter.clone();
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) >= 2) }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_never_ready() {
        let start = Instant::now();
        let cancel = CancellationToken::new();

        let err = poll_for_readiness(Duration::from_secs(10), &cancel, || async { Ok(false) })
            .await
            .unwrap_err();

        assert!(matches!(err, AddonError::PollTimedOut));
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_aborts_without_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let counter = calls.clone();

        let err = poll_for_readiness(Duration::from_secs(60), &cancel, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<bool, _>(AddonError::ParseError("boom".to_string())) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, AddonError::ProbeFailed(_)));
        assert!(!err.is_timeout());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_takes_timeout_path() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = poll_for_readiness(Duration::from_secs(600), &cancel, || async { Ok(false) })
            .await
            .unwrap_err();

        assert!(matches!(err, AddonError::PollTimedOut));
        assert!(start.elapsed() < Duration::from_secs(5) + POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_probe_is_abandoned_at_deadline() {
        let cancel = CancellationToken::new();

        let err = poll_for_readiness(Duration::from_secs(3), &cancel, || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(true)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, AddonError::PollTimedOut));
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Process-wide capture of standard error.
//!
//! File descriptor 2 is shared by the whole process and every child it
//! spawns, so only one capture may be active at a time. The lock is held for
//! the full operation, not just around the redirect, which means concurrent
//! callers serialize completely. Nested captures deadlock.

use crate::error::{AddonError, Result};
use nix::libc::STDERR_FILENO;
use nix::unistd::{dup, dup2, pipe};
use std::fs::File;
use std::future::Future;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::LazyLock;
use std::thread::JoinHandle;
use tokio::sync::Mutex;
use tracing::{trace, warn};

static CAPTURE_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Run `operation` with stderr redirected into a buffer.
///
/// On failure the trimmed captured text, if any, is attached to the error as
/// [`AddonError::Captured`]; the original error stays reachable as its source.
/// On success the captured text is discarded. Stderr is restored on every exit
/// path, including when the returned future is dropped early.
pub async fn with_captured_stderr<T, Fut>(operation: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    let _guard = CAPTURE_LOCK.lock().await;

    let mut redirect = StderrRedirect::install()?;
    let result = operation.await;
    let captured = redirect.restore();

    match result {
        Ok(value) => {
            trace!("Discarding {} bytes of captured stderr", captured.len());
            Ok(value)
        }
        Err(e) => {
            let output = String::from_utf8_lossy(&captured).trim().to_string();
            if output.is_empty() {
                Err(e)
            } else {
                Err(AddonError::Captured {
                    source: Box::new(e),
                    output,
                })
            }
        }
    }
}

/// Active redirect of fd 2 into a pipe. Dropping it restores the original stderr.
struct StderrRedirect {
    saved: Option<OwnedFd>,
    drain: Option<JoinHandle<io::Result<Vec<u8>>>>,
}

impl StderrRedirect {
    fn install() -> Result<Self> {
        let (read_end, write_end) = pipe().map_err(capture_error("pipe"))?;

        let drain = std::thread::Builder::new()
            .name("stderr-drain".to_string())
            .spawn(move || {
                let mut reader = File::from(read_end);
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(buf)
            })?;

        let saved = match dup(STDERR_FILENO) {
            // SAFETY: dup returned a fresh descriptor that nothing else owns.
            Ok(fd) => unsafe { OwnedFd::from_raw_fd(fd) },
            Err(e) => {
                drop(write_end);
                let _ = drain.join();
                return Err(capture_error("dup")(e));
            }
        };

        let _ = io::stderr().flush();
        if let Err(e) = dup2(write_end.as_raw_fd(), STDERR_FILENO) {
            drop(write_end);
            let _ = drain.join();
            return Err(capture_error("dup2")(e));
        }
        // fd 2 now holds the only write reference to the pipe.
        drop(write_end);

        Ok(Self {
            saved: Some(saved),
            drain: Some(drain),
        })
    }

    /// Put the original stderr back and collect everything written meanwhile.
    /// Restoring fd 2 drops the last write reference, so the drain sees EOF.
    fn restore(&mut self) -> Vec<u8> {
        let Some(saved) = self.saved.take() else {
            return Vec::new();
        };

        let _ = io::stderr().flush();
        if let Err(e) = dup2(saved.as_raw_fd(), STDERR_FILENO) {
            warn!("Failed to restore stderr: {}", e);
        }
        drop(saved);

        match self.drain.take().map(JoinHandle::join) {
            Some(Ok(Ok(buf))) => buf,
            Some(Ok(Err(e))) => {
                warn!("Failed to read captured stderr: {}", e);
                Vec::new()
            }
            Some(Err(_)) => {
                warn!("stderr drain thread panicked");
                Vec::new()
            }
            None => Vec::new(),
        }
    }
}

impl Drop for StderrRedirect {
    fn drop(&mut self) {
        self.restore();
    }
}

fn capture_error(call: &'static str) -> impl Fn(nix::Error) -> AddonError {
    move |e| AddonError::CaptureError(format!("{} failed: {}", call, e))
}

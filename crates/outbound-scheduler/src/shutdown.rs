// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! Installs handlers for SIGTERM and SIGINT (Ctrl+C), triggering a
//! [`CancellationToken`] that every loop monitors. Running tasks are given a
//! grace period before they are aborted.

use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is
/// received. If the SIGTERM handler cannot be installed, only Ctrl+C is
/// watched.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "cannot install SIGTERM handler, watching Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Waits up to `grace` for every task in `tasks`, then aborts the rest.
///
/// Returns how many tasks had to be aborted.
pub async fn drain(tasks: &mut JoinSet<()>, grace: Duration) -> usize {
    if tasks.is_empty() {
        return 0;
    }
    let pending = tasks.len();
    debug!(pending, grace_secs = grace.as_secs(), "draining tasks");

    let joined = tokio::time::timeout(grace, async {
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    error!(error = %e, "task panicked during shutdown");
                }
            }
        }
    })
    .await;
    if joined.is_ok() {
        return 0;
    }

    let stragglers = tasks.len();
    warn!(stragglers, "grace period elapsed, aborting remaining tasks");
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
    stragglers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_signal_handler_returns_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }

    #[tokio::test]
    async fn drain_empty_set_is_immediate() {
        let mut tasks = JoinSet::new();
        assert_eq!(drain(&mut tasks, Duration::from_secs(60)).await, 0);
    }

    #[tokio::test]
    async fn finished_tasks_drain_cleanly() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async {});
        tasks.spawn(async { tokio::time::sleep(Duration::from_millis(5)).await });
        assert_eq!(drain(&mut tasks, Duration::from_secs(5)).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_tasks_are_aborted_after_grace() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async {});
        tasks.spawn(std::future::pending::<()>());
        assert_eq!(drain(&mut tasks, Duration::from_secs(15)).await, 1);
        assert!(tasks.is_empty());
    }
}

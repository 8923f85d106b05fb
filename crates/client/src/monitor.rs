//! Background task that replays the offline queue when connectivity returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::DEFAULT_REPLAY_RETRY_INTERVAL;
use crate::offline::ConnectivityState;
use crate::queue::{OfflineQueue, ReplayReport};

/// Replays the queue on every Offline→Online edge, after each sign-in, on
/// request, and again after `retry_interval` while writes are waiting on a
/// server error.
pub struct ConnectivityMonitor {
    queue: Arc<OfflineQueue>,
    shutdown: Arc<Notify>,
    retry_interval: Duration,
}

/// Handle on a running monitor.
#[derive(Debug)]
pub struct MonitorHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop the monitor and wait for it to exit. A replay already in flight
    /// finishes first.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(err) = self.task.await {
            tracing::error!("connectivity monitor panicked: {err}");
        }
    }
}

impl ConnectivityMonitor {
    pub fn new(queue: Arc<OfflineQueue>) -> Self {
        Self {
            queue,
            shutdown: Arc::new(Notify::new()),
            retry_interval: DEFAULT_REPLAY_RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Spawn the monitor.
    ///
    /// If the client is already online and writes are waiting from a
    /// previous session, they are replayed right away.
    pub fn start(self) -> MonitorHandle {
        let shutdown = self.shutdown.clone();
        let queue = self.queue;
        let retry_interval = self.retry_interval;
        let mut rx = queue.connectivity().subscribe();
        let mut sessions = queue.sessions();

        let task = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                tracing::info!("connectivity monitor started");

                let mut retry_at: Option<Instant> = None;
                let mut last = *rx.borrow_and_update();
                let _ = sessions.borrow_and_update();
                if last == ConnectivityState::Online && !queue.is_empty().await {
                    retry_at = Self::replay(&queue, retry_interval).await;
                }

                loop {
                    let retry_due = retry_at.unwrap_or_else(Instant::now);
                    let replay = tokio::select! {
                        _ = shutdown.notified() => {
                            tracing::info!("connectivity monitor received shutdown signal");
                            break;
                        }
                        changed = rx.changed() => {
                            if changed.is_err() {
                                tracing::debug!("connectivity channel closed");
                                break;
                            }
                            let current = *rx.borrow_and_update();
                            let previous = std::mem::replace(&mut last, current);
                            // A quick Offline→Online flip can be coalesced into
                            // one Online notification; pending writes decide.
                            current == ConnectivityState::Online
                                && (previous == ConnectivityState::Offline || !queue.is_empty().await)
                        }
                        changed = sessions.changed() => {
                            if changed.is_err() {
                                tracing::debug!("session channel closed");
                                break;
                            }
                            let _ = sessions.borrow_and_update();
                            tracing::debug!("signed in; checking the queue");
                            !queue.is_empty().await
                        }
                        _ = queue.replay_requested() => true,
                        _ = tokio::time::sleep_until(retry_due), if retry_at.is_some() => {
                            retry_at = None;
                            true
                        }
                    };

                    if replay && queue.connectivity().is_online() {
                        retry_at = Self::replay(&queue, retry_interval).await;
                    }
                }

                tracing::info!("connectivity monitor stopped");
            }
        });

        MonitorHandle { shutdown, task }
    }

    /// Run one pass. Returns when to try again if writes are left waiting on
    /// a server error.
    async fn replay(queue: &OfflineQueue, retry_interval: Duration) -> Option<Instant> {
        match queue.replay().await {
            Ok(report) if report.is_empty() => {
                tracing::debug!("replay requested; nothing queued");
                None
            }
            Ok(report) => {
                tracing::info!(
                    synced = report.synced.len(),
                    retained = report.retained.len(),
                    dead_lettered = report.dead_lettered.len(),
                    "queue replayed"
                );
                retry_after(&report, retry_interval)
            }
            Err(err) => {
                tracing::error!("queue replay failed: {err}");
                None
            }
        }
    }
}

fn retry_after(report: &ReplayReport, interval: Duration) -> Option<Instant> {
    // A halted pass waits for connectivity or a new session instead.
    if report.halted || report.retained.is_empty() {
        None
    } else {
        Some(Instant::now() + interval)
    }
}

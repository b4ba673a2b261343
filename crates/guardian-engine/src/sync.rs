//! Per-bracelet presence synchronization.
//!
//! One worker task per watched bracelet reconciles the push stream with
//! the polling endpoint into a single accepted-sample stream:
//!
//! - On start the worker subscribes to push and arms a fallback timer.
//! - A push sample before the timer fires cancels it; polling never runs.
//! - If the timer fires first, a fixed-period poll loop starts and keeps
//!   running until `stop`, even if push samples show up later: push
//!   delivery is not guaranteed to persist, so polling stays on as the
//!   freshness backstop.
//! - Every sample, from either channel, passes the monotonic-acceptance
//!   rule on `observed_at` before it can mutate bracelet state or reach
//!   the dispatcher.
//!
//! Workers share nothing with each other; each owns its bracelet's state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use domain::models::{Bracelet, PositionSample};

use crate::config::SyncConfig;
use crate::metrics;
use crate::transport::{PollChannel, PushChannel};

/// Reconciles the two inbound channels into one authoritative stream per
/// bracelet.
pub struct PresenceSynchronizer {
    config: SyncConfig,
    push: Arc<dyn PushChannel>,
    poll: Arc<dyn PollChannel>,
    samples_tx: mpsc::Sender<PositionSample>,
    workers: Mutex<HashMap<Uuid, Worker>>,
}

struct Worker {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    state: Arc<RwLock<Bracelet>>,
}

impl PresenceSynchronizer {
    /// Accepted samples are forwarded on `samples_tx` toward the dispatcher.
    pub fn new(
        config: SyncConfig,
        push: Arc<dyn PushChannel>,
        poll: Arc<dyn PollChannel>,
        samples_tx: mpsc::Sender<PositionSample>,
    ) -> Self {
        Self {
            config,
            push,
            poll,
            samples_tx,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Start watching a bracelet. A bracelet already being watched keeps
    /// its running worker.
    pub async fn start(&self, bracelet: Bracelet) {
        let bracelet_id = bracelet.id;
        let mut workers = self.workers.lock().await;
        if workers.contains_key(&bracelet_id) {
            debug!(bracelet_id = %bracelet_id, "Presence worker already running");
            return;
        }

        let state = Arc::new(RwLock::new(bracelet));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_worker(
            self.config.clone(),
            bracelet_id,
            Arc::clone(&state),
            Arc::clone(&self.push),
            Arc::clone(&self.poll),
            self.samples_tx.clone(),
            shutdown_rx,
        ));

        workers.insert(
            bracelet_id,
            Worker {
                shutdown_tx,
                handle,
                state,
            },
        );
        info!(bracelet_id = %bracelet_id, "Presence worker started");
    }

    /// Last authoritative state of a watched bracelet.
    pub async fn snapshot(&self, bracelet_id: Uuid) -> Option<Bracelet> {
        let workers = self.workers.lock().await;
        match workers.get(&bracelet_id) {
            Some(worker) => Some(worker.state.read().await.clone()),
            None => None,
        }
    }

    /// Stop watching a bracelet. Idempotent. When this returns, the worker
    /// has exited: no further sample will be applied for this bracelet.
    pub async fn stop(&self, bracelet_id: Uuid) {
        let worker = {
            let mut workers = self.workers.lock().await;
            workers.remove(&bracelet_id)
        };
        let Some(worker) = worker else {
            debug!(bracelet_id = %bracelet_id, "Stop requested for unwatched bracelet");
            return;
        };

        let _ = worker.shutdown_tx.send(true);
        if let Err(err) = worker.handle.await {
            warn!(bracelet_id = %bracelet_id, error = %err, "Presence worker panicked");
        }
        info!(bracelet_id = %bracelet_id, "Presence worker stopped");
    }

    /// Stop every worker.
    pub async fn shutdown(&self) {
        let ids: Vec<Uuid> = {
            let workers = self.workers.lock().await;
            workers.keys().copied().collect()
        };
        for bracelet_id in ids {
            self.stop(bracelet_id).await;
        }
    }
}

async fn run_worker(
    config: SyncConfig,
    bracelet_id: Uuid,
    state: Arc<RwLock<Bracelet>>,
    push: Arc<dyn PushChannel>,
    poll: Arc<dyn PollChannel>,
    samples_tx: mpsc::Sender<PositionSample>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut push_rx = match push.subscribe(bracelet_id).await {
        Ok(rx) => Some(rx),
        Err(err) => {
            warn!(
                bracelet_id = %bracelet_id,
                error = %err,
                "Push subscription failed, fallback timer will engage polling"
            );
            metrics::record_push_subscription_error();
            None
        }
    };

    let fallback = tokio::time::sleep(config.fallback_delay());
    tokio::pin!(fallback);
    let mut fallback_armed = true;
    let mut poll_timer: Option<tokio::time::Interval> = None;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender means the synchronizer itself is gone.
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            update = recv_push(&mut push_rx) => {
                match update {
                    Some(sample) => {
                        if fallback_armed {
                            fallback_armed = false;
                            debug!(
                                bracelet_id = %bracelet_id,
                                "Push channel live, fallback timer cancelled"
                            );
                        }
                        apply_sample(bracelet_id, &state, &samples_tx, sample).await;
                    }
                    None => {
                        // Subscription dropped: behave as if no push had
                        // ever arrived. If polling is already running it
                        // keeps covering freshness; otherwise the fallback
                        // timer is re-armed from now.
                        warn!(bracelet_id = %bracelet_id, "Push subscription closed");
                        metrics::record_push_subscription_error();
                        push_rx = None;
                        if poll_timer.is_none() && !fallback_armed {
                            fallback.as_mut().reset(
                                tokio::time::Instant::now() + config.fallback_delay(),
                            );
                            fallback_armed = true;
                        }
                    }
                }
            }
            _ = &mut fallback, if fallback_armed => {
                fallback_armed = false;
                info!(
                    bracelet_id = %bracelet_id,
                    period_secs = config.poll_interval_secs,
                    "No push sample within fallback delay, starting poll loop"
                );
                poll_timer = Some(tokio::time::interval(config.poll_interval()));
            }
            _ = poll_tick(&mut poll_timer) => {
                match poll.fetch_state(bracelet_id).await {
                    Ok(snapshot) => {
                        if let Some(sample) = snapshot.into_sample() {
                            apply_sample(bracelet_id, &state, &samples_tx, sample).await;
                        } else {
                            debug!(bracelet_id = %bracelet_id, "Polled snapshot has no position yet");
                        }
                    }
                    Err(err) => {
                        warn!(
                            bracelet_id = %bracelet_id,
                            error = %err,
                            "Poll fetch failed, retrying on next tick"
                        );
                        metrics::record_poll_failure();
                    }
                }
            }
        }
    }

    debug!(bracelet_id = %bracelet_id, "Presence worker exiting");
}

/// Receive from the push stream, or park forever once it is gone so the
/// other `select!` branches keep the worker alive.
async fn recv_push(
    push_rx: &mut Option<mpsc::Receiver<PositionSample>>,
) -> Option<PositionSample> {
    match push_rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Tick the poll timer, or park forever while polling is not engaged.
async fn poll_tick(poll_timer: &mut Option<tokio::time::Interval>) {
    match poll_timer.as_mut() {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Apply a sample to the bracelet state and forward it when accepted.
async fn apply_sample(
    bracelet_id: Uuid,
    state: &RwLock<Bracelet>,
    samples_tx: &mpsc::Sender<PositionSample>,
    sample: PositionSample,
) {
    if let Err(err) = sample.validate() {
        warn!(
            bracelet_id = %bracelet_id,
            source = %sample.source,
            error = %err,
            "Dropping sample with invalid coordinates"
        );
        metrics::record_sample_invalid(sample.source);
        return;
    }

    let accepted = state.write().await.accept(&sample);
    if !accepted {
        debug!(
            bracelet_id = %bracelet_id,
            source = %sample.source,
            observed_at = %sample.observed_at,
            "Dropped stale sample"
        );
        metrics::record_sample_stale(sample.source);
        return;
    }

    metrics::record_sample_accepted(sample.source);
    if samples_tx.send(sample).await.is_err() {
        warn!(bracelet_id = %bracelet_id, "Dispatcher channel closed, accepted sample not forwarded");
    }
}

//! Background tasks that drive the coordinator.

use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::coordinator::SyncCoordinator;
use crate::connectivity::ConnectivityEvent;
use crate::remote::RemoteNotes;

/// Drain worker, connectivity listener and periodic probe for one coordinator
///
/// Dropping the scheduler without calling [`SyncScheduler::shutdown`] leaves
/// the tasks running until the runtime stops.
pub struct SyncScheduler {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Spawn the tasks on the current runtime.
    ///
    /// The connectivity subscription is taken before this returns, so a
    /// transition reported right after `start` is not missed.
    pub fn start<R: RemoteNotes>(coordinator: &SyncCoordinator<R>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let connectivity_events = coordinator.connectivity().subscribe();

        let tasks = vec![
            tokio::spawn(drain_worker(coordinator.clone(), shutdown.subscribe())),
            tokio::spawn(connectivity_listener(
                coordinator.clone(),
                connectivity_events,
                shutdown.subscribe(),
            )),
            tokio::spawn(probe_timer(coordinator.clone(), shutdown.subscribe())),
        ];

        tracing::info!(
            interval_secs = coordinator.options().sync_interval.as_secs(),
            "Sync scheduler started"
        );
        Self { shutdown, tasks }
    }

    /// Stop all tasks and wait for them to exit. An in-flight drain finishes
    /// first.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        for task in self.tasks {
            if let Err(error) = task.await {
                tracing::warn!("Sync task ended abnormally: {error}");
            }
        }
        tracing::info!("Sync scheduler stopped");
    }
}

/// Runs one drain per wake-up. Wake-ups that arrive while a drain is running
/// collapse into a single follow-up drain.
async fn drain_worker<R: RemoteNotes>(
    coordinator: SyncCoordinator<R>,
    mut shutdown: watch::Receiver<bool>,
) {
    let signal = coordinator.drain_signal();
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            () = signal.notified() => {
                if let Err(error) = coordinator.drain().await {
                    tracing::error!("Drain failed: {error}");
                }
            }
        }
    }
}

/// Turns each `BecameOnline` into exactly one drain request
async fn connectivity_listener<R: RemoteNotes>(
    coordinator: SyncCoordinator<R>,
    mut events: broadcast::Receiver<ConnectivityEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            event = events.recv() => match event {
                Ok(ConnectivityEvent::BecameOnline) => coordinator.request_drain(),
                Ok(ConnectivityEvent::BecameOffline) => {
                    tracing::debug!("Remote unreachable, holding queued operations");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Connectivity listener lagged");
                    coordinator.request_drain();
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

/// Probe reachability every interval. While already online, each tick
/// requests a drain, which is followed by a pull.
async fn probe_timer<R: RemoteNotes>(
    coordinator: SyncCoordinator<R>,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = coordinator.options().sync_interval.max(Duration::from_millis(10));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let reachable = coordinator.remote().probe().await;
                // A transition to online is handled by the connectivity listener
                if coordinator.connectivity().report(reachable).is_none() && reachable {
                    coordinator.request_drain();
                }
            }
        }
    }
}

use quill_core::{SyncEvent, SyncScheduler};
use tokio::sync::broadcast;

use crate::commands::common::{probe_remote, short_id, Coordinator};
use crate::error::CliError;

pub async fn run_watch(coordinator: &Coordinator) -> Result<(), CliError> {
    let mut events = coordinator.subscribe();
    let scheduler = SyncScheduler::start(coordinator);

    let online = probe_remote(coordinator).await;
    println!(
        "Watching {} ({}); press Ctrl-C to stop",
        coordinator.remote().base_url(),
        if online { "online" } else { "offline" }
    );

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = format_event(&event) {
                        println!("{line}");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed sync events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    scheduler.shutdown().await;
    Ok(())
}

/// One output line per event worth showing; index changes are silent
pub fn format_event(event: &SyncEvent) -> Option<String> {
    match event {
        SyncEvent::IndexChanged { .. } => None,
        SyncEvent::DrainFinished(report) => (report.sent + report.failed + report.rejected > 0)
            .then(|| {
                format!(
                    "pushed {}, failed {}, rejected {}",
                    report.sent, report.failed, report.rejected
                )
            }),
        SyncEvent::PullFinished(report) => (report.applied() > 0).then(|| {
            format!(
                "pulled {} change(s) from {} remote note(s)",
                report.applied(),
                report.fetched
            )
        }),
        SyncEvent::SyncFailed { id, message } => {
            Some(format!("sync failed for {}: {message}", short_id(id)))
        }
    }
}

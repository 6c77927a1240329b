use quill_core::sync::SyncReport;

use crate::commands::common::{probe_remote, Coordinator};
use crate::error::CliError;

pub async fn run_sync(coordinator: &Coordinator, as_json: bool) -> Result<(), CliError> {
    if !probe_remote(coordinator).await {
        let status = coordinator.status()?;
        println!(
            "Remote unreachable at {}; {} change(s) stay queued",
            coordinator.remote().base_url(),
            status.queued
        );
        return Ok(());
    }

    let report = coordinator.sync_now().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_sync_report(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    let mut lines = Vec::new();

    match &report.drain {
        Some(drain) => {
            lines.push(format!(
                "Pushed {} change(s): {} failed, {} rejected, {} held back",
                drain.sent, drain.failed, drain.rejected, drain.skipped
            ));
            if let Some(error) = &drain.last_error {
                lines.push(format!("Last push error: {error}"));
            }
        }
        None => lines.push("Push skipped: a sync is already running".to_string()),
    }

    if let Some(pull) = report.pull {
        lines.push(format!(
            "Pulled {} note(s): {} new, {} updated, {} kept local",
            pull.fetched, pull.inserted, pull.overwritten, pull.kept_local
        ));
    }
    if let Some(error) = &report.pull_error {
        lines.push(format!("Pull failed: {error}"));
    }

    lines
}

use quill_core::models::Operation;
use quill_core::sync::SyncStatusSnapshot;
use serde::Serialize;

use crate::commands::common::{format_timestamp, probe_remote, short_id, Coordinator};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct StatusOutput<'a> {
    remote_url: &'a str,
    #[serde(flatten)]
    status: &'a SyncStatusSnapshot,
    rejected_operations: &'a [Operation],
}

pub async fn run_status(coordinator: &Coordinator, as_json: bool) -> Result<(), CliError> {
    probe_remote(coordinator).await;
    let status = coordinator.status()?;
    let rejected = coordinator.rejected()?;

    if as_json {
        let output = StatusOutput {
            remote_url: coordinator.remote().base_url(),
            status: &status,
            rejected_operations: &rejected,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("remote:     {}", coordinator.remote().base_url());
    for line in format_status_lines(&status, &rejected) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_status_lines(status: &SyncStatusSnapshot, rejected: &[Operation]) -> Vec<String> {
    let mut lines = vec![
        format!(
            "connection: {}",
            if status.online { "online" } else { "offline" }
        ),
        format!("queued:     {}", status.queued),
        format!("rejected:   {}", status.rejected),
        format!(
            "last pull:  {}",
            status
                .last_pull_at
                .map_or_else(|| "never".to_string(), format_timestamp)
        ),
    ];
    if let Some(error) = &status.last_error {
        lines.push(format!("last error: {error}"));
    }

    for operation in rejected {
        lines.push(format!(
            "  {} {:<6} {}",
            short_id(&operation.target_id),
            operation.kind().as_str(),
            operation.last_error.as_deref().unwrap_or("rejected")
        ));
    }
    lines
}

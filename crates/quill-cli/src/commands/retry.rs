use crate::commands::common::{resolve_note, Coordinator};
use crate::error::CliError;

pub fn run_retry(coordinator: &Coordinator, id: &str) -> Result<(), CliError> {
    let entry = resolve_note(id, coordinator)?;
    let rearmed = coordinator.retry(&entry.id)?;

    if rearmed == 0 {
        println!("Nothing to retry for {}", entry.id);
    } else {
        println!(
            "Re-queued {rearmed} change(s) for {}; run `quill sync` to push them",
            entry.id
        );
    }
    Ok(())
}

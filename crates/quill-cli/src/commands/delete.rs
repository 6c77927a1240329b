use crate::commands::common::{resolve_note, Coordinator};
use crate::error::CliError;

pub fn run_delete(coordinator: &Coordinator, id: &str) -> Result<(), CliError> {
    let entry = resolve_note(id, coordinator)?;
    coordinator.delete(&entry.id)?;
    println!("Deleted {}", entry.id);
    Ok(())
}

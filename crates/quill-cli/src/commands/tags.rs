use serde::Serialize;

use crate::commands::common::Coordinator;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct TagItem {
    tag: String,
    notes: usize,
}

pub fn run_tags(coordinator: &Coordinator, as_json: bool) -> Result<(), CliError> {
    let tags = coordinator.list_tags()?;

    if as_json {
        let items = tags
            .into_iter()
            .map(|(tag, notes)| TagItem { tag, notes })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if tags.is_empty() {
        println!("No tags yet.");
    }
    for (tag, notes) in tags {
        println!("#{tag:<24}  {notes}");
    }
    Ok(())
}

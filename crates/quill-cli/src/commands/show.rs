use crate::commands::common::{format_timestamp, render_tags, resolve_note, Coordinator};
use crate::error::CliError;

pub fn run_show(coordinator: &Coordinator, id: &str, as_json: bool) -> Result<(), CliError> {
    let entry = resolve_note(id, coordinator)?;
    let record = coordinator
        .record(&entry.id)?
        .ok_or_else(|| CliError::NoteNotFound(entry.id.to_string()))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("{}", record.title);
    println!("id:         {}", record.id);
    println!("status:     {}", entry.sync_status);
    if !record.tags.is_empty() {
        println!("tags:       {}", render_tags(&record.tags));
    }
    if let Some(collection_id) = &record.collection_id {
        println!("collection: {collection_id}");
    }
    println!("created:    {}", format_timestamp(record.created_at));
    println!("updated:    {}", format_timestamp(record.updated_at));
    if !record.body.is_empty() {
        println!();
        println!("{}", record.body);
    }
    Ok(())
}

use quill_core::NotePatch;

use crate::commands::common::{capture_editor_input_with_initial, resolve_note, Coordinator};
use crate::error::CliError;

pub fn run_edit(coordinator: &Coordinator, id: &str, patch: NotePatch) -> Result<(), CliError> {
    let entry = resolve_note(id, coordinator)?;

    let patch = if patch.is_empty() {
        let record = coordinator
            .record(&entry.id)?
            .ok_or_else(|| CliError::NoteNotFound(entry.id.to_string()))?;
        let Some(edited_body) = capture_editor_input_with_initial(&record.body)? else {
            return Err(CliError::EmptyEditedContent);
        };
        if edited_body == record.body {
            println!("{}", entry.id);
            return Ok(());
        }
        NotePatch {
            body: Some(edited_body),
            ..NotePatch::default()
        }
    } else {
        patch
    };

    let updated = coordinator.update(&entry.id, patch)?;
    println!("{}", updated.id);
    Ok(())
}

/// Patch from the `edit` flags; empty when no field was given
pub fn patch_from_args(
    title: Option<String>,
    body: Option<String>,
    tags: Option<Vec<String>>,
    collection: Option<String>,
    no_collection: bool,
) -> NotePatch {
    let collection_id = if no_collection {
        Some(None)
    } else {
        collection.map(Some)
    };

    NotePatch {
        title,
        body,
        tags,
        collection_id,
    }
}

use quill_core::{IndexEntry, NoteDraft};

use crate::commands::common::{normalize_content, normalize_title, read_piped_stdin, Coordinator};
use crate::error::CliError;

pub fn run_add(
    coordinator: &Coordinator,
    title_parts: &[String],
    body: Option<String>,
    tags: Vec<String>,
    collection: Option<String>,
) -> Result<(), CliError> {
    let body = match body {
        Some(body) => normalize_content(&body),
        None => read_piped_stdin()?,
    };

    let entry = add_note(coordinator, title_parts, body, tags, collection)?;
    println!("{}", entry.id);
    Ok(())
}

pub fn add_note(
    coordinator: &Coordinator,
    title_parts: &[String],
    body: Option<String>,
    tags: Vec<String>,
    collection: Option<String>,
) -> Result<IndexEntry, CliError> {
    let title = normalize_title(title_parts)?;

    let mut draft = NoteDraft::new(title).with_tags(tags);
    if let Some(body) = body {
        draft = draft.with_body(body);
    }
    if let Some(collection) = collection {
        draft = draft.with_collection(collection);
    }

    Ok(coordinator.create(draft)?)
}

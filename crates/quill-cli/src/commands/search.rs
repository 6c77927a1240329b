use crate::commands::common::{
    entry_to_list_item, format_entry_lines, normalize_search_query, Coordinator, NoteListItem,
};
use crate::error::CliError;

pub fn run_search(
    coordinator: &Coordinator,
    query: &str,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let normalized_query = normalize_search_query(query)?;
    let mut entries = coordinator.search(&normalized_query)?;
    entries.truncate(limit);

    if as_json {
        let json_items = entries
            .iter()
            .map(entry_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_entry_lines(&entries) {
            println!("{line}");
        }
    }

    Ok(())
}

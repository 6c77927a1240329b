use quill_core::db::ListFilter;

use crate::cli::{SortArg, StatusArg};
use crate::commands::common::{entry_to_list_item, format_entry_lines, Coordinator, NoteListItem};
use crate::error::CliError;

pub struct ListArgs {
    pub limit: usize,
    pub tag: Option<String>,
    pub collection: Option<String>,
    pub status: Option<StatusArg>,
    pub sort: SortArg,
}

pub fn run_list(coordinator: &Coordinator, args: ListArgs, as_json: bool) -> Result<(), CliError> {
    let filter = ListFilter {
        tag: args.tag,
        collection_id: args.collection,
        sync_status: args.status.map(Into::into),
        limit: Some(args.limit),
        offset: 0,
    };
    let entries = coordinator.list(&filter, args.sort.into())?;

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

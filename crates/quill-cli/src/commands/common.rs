use std::collections::BTreeSet;
use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use quill_core::config::CONFIG_FILE_NAME;
use quill_core::db::Database;
use quill_core::{
    ConnectivityDetector, EngineConfig, HttpNoteRemote, IndexEntry, NoteId, RemoteNotes,
    SyncCoordinator,
};
use serde::Serialize;

use crate::error::CliError;

pub type Coordinator = SyncCoordinator<HttpNoteRemote>;

const SHORT_ID_LEN: usize = 13;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub tags: Vec<String>,
    pub collection_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
    pub sync_status: String,
}

pub fn resolve_config_path(cli_config: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_config {
        return Ok(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join("quill").join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI config directory".to_string()))
}

/// Config file contents with `QUILL_*` environment overrides applied
pub fn load_config(path: &Path) -> Result<EngineConfig, CliError> {
    let mut config = EngineConfig::load_from_path(path)?;
    config.apply_env_overrides(|key| env::var(key).ok())?;
    Ok(config)
}

pub fn resolve_db_path(
    cli_db_path: Option<PathBuf>,
    config: &EngineConfig,
) -> Result<PathBuf, CliError> {
    match cli_db_path.or_else(|| config.database_path.clone()) {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("quill").join("quill.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

/// Build the engine for one CLI invocation.
///
/// Connectivity starts offline; commands that talk to the remote probe first.
pub fn open_coordinator(config: &EngineConfig, db_path: &Path) -> Result<Coordinator, CliError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = Database::open(db_path)?;
    let remote = HttpNoteRemote::new(&config.remote_url, config.request_timeout())?;
    tracing::debug!(
        db_path = %db_path.display(),
        remote_url = %remote.base_url(),
        "Opened local note index"
    );

    Ok(SyncCoordinator::new(
        db,
        Arc::new(remote),
        ConnectivityDetector::new(false),
        config.sync_options(),
    ))
}

/// Probe the remote and feed the result to the connectivity detector
pub async fn probe_remote(coordinator: &Coordinator) -> bool {
    let reachable = coordinator.remote().probe().await;
    coordinator.connectivity().report(reachable);
    reachable
}

pub fn resolve_note(query: &str, coordinator: &Coordinator) -> Result<IndexEntry, CliError> {
    let query = normalize_note_identifier(query)?;

    if let Ok(note_id) = query.parse::<NoteId>() {
        if let Some(entry) = coordinator.get(&note_id)? {
            return Ok(entry);
        }
    }

    let matching_ids = coordinator.ids_with_prefix(&query, 3)?;

    match matching_ids.as_slice() {
        [] => Err(CliError::NoteNotFound(query)),
        [id] => coordinator.get(id)?.ok_or(CliError::NoteNotFound(query)),
        _ => {
            let options = matching_ids
                .iter()
                .map(short_id)
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &NoteId) -> String {
    id.to_string().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_entry_lines(entries: &[IndexEntry]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entries
        .iter()
        .map(|entry| {
            let short_id = short_id(&entry.id);
            let status = entry.sync_status.as_str();
            let title = truncate_line(&entry.title, 40);
            let relative_time = format_relative_time(entry.updated_at, now_ms);
            let tags = render_tags(&entry.tags);

            if tags.is_empty() {
                format!("{short_id:<13}  {status:<7}  {title:<40}  {relative_time}")
            } else {
                format!("{short_id:<13}  {status:<7}  {title:<40}  {relative_time:<10}  {tags}")
            }
        })
        .collect()
}

pub fn entry_to_list_item(entry: &IndexEntry) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();

    NoteListItem {
        id: entry.id.to_string(),
        title: entry.title.clone(),
        preview: entry.preview.clone(),
        tags: entry.tags.iter().cloned().collect(),
        collection_id: entry.collection_id.clone(),
        created_at: entry.created_at,
        updated_at: entry.updated_at,
        relative_time: format_relative_time(entry.updated_at, now_ms),
        sync_status: entry.sync_status.to_string(),
    }
}

/// First line of `text` with whitespace collapsed, cut to `max_chars`
pub fn truncate_line(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn render_tags(tags: &BTreeSet<String>) -> String {
    tags.iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_title(parts: &[String]) -> Result<String, CliError> {
    normalize_content(&parts.join(" ")).ok_or(CliError::EmptyTitle)
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    normalize_content(query).ok_or(CliError::EmptySearchQuery)
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    normalize_content(id).ok_or(CliError::EmptyNoteId)
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        // EDITOR may carry arguments, e.g. "code --wait"
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("quill-note-{}-{now}.md", std::process::id()))
}

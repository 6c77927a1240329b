use std::path::PathBuf;

use pretty_assertions::assert_eq;
use quill_core::models::{Operation, OperationPayload, OperationState};
use quill_core::sync::{DrainReport, PullReport, SyncReport, SyncStatusSnapshot};
use quill_core::{EngineConfig, NoteId, NotePatch, SyncEvent, SyncStatus};
use tempfile::{tempdir, TempDir};

use crate::commands::add::add_note;
use crate::commands::common::{
    default_editor, format_relative_time, normalize_content, normalize_search_query,
    normalize_title, open_coordinator, resolve_db_path, resolve_note, short_id, truncate_line,
    Coordinator,
};
use crate::commands::config::{set_config_values, ConfigUpdates};
use crate::commands::delete::run_delete;
use crate::commands::edit::{patch_from_args, run_edit};
use crate::commands::retry::run_retry;
use crate::commands::status::format_status_lines;
use crate::commands::sync::format_sync_report;
use crate::commands::watch::format_event;
use crate::error::CliError;

fn offline_engine() -> (Coordinator, TempDir) {
    let dir = tempdir().unwrap();
    let config = EngineConfig {
        // Never contacted: the coordinator starts offline
        remote_url: "http://127.0.0.1:9".to_string(),
        ..EngineConfig::default()
    };
    let db_path = dir.path().join("nested").join("quill.db");
    let coordinator = open_coordinator(&config, &db_path).unwrap();
    (coordinator, dir)
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
    assert_eq!(
        normalize_content("line 1\nline 2\n"),
        Some("line 1\nline 2".to_string())
    );
}

#[test]
fn normalize_helpers_reject_blank_input() {
    assert!(matches!(normalize_title(&[]), Err(CliError::EmptyTitle)));
    assert!(matches!(
        normalize_search_query("   "),
        Err(CliError::EmptySearchQuery)
    ));
    assert_eq!(normalize_title(&words("  buy   milk ")).unwrap(), "buy milk");
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn format_relative_time_buckets() {
    let now = 1_700_000_000_000;
    assert_eq!(format_relative_time(now - 5_000, now), "just now");
    assert_eq!(format_relative_time(now - 5 * 60_000, now), "5m ago");
    assert_eq!(format_relative_time(now - 3 * 3_600_000, now), "3h ago");
    assert_eq!(format_relative_time(now - 2 * 86_400_000, now), "2d ago");
    assert_eq!(format_relative_time(now - 400 * 86_400_000, now), "1y ago");
    assert_eq!(format_relative_time(now + 60_000, now), "just now");
}

#[test]
fn truncate_line_uses_first_line() {
    assert_eq!(truncate_line("first   line\nsecond", 40), "first line");
    assert_eq!(truncate_line("abcdefghij", 6), "abc...");
}

#[test]
fn resolve_db_path_prefers_cli_then_config() {
    let config = EngineConfig {
        database_path: Some(PathBuf::from("/data/from-config.db")),
        ..EngineConfig::default()
    };

    let from_cli = resolve_db_path(Some(PathBuf::from("/tmp/cli.db")), &config).unwrap();
    assert_eq!(from_cli, PathBuf::from("/tmp/cli.db"));

    let from_config = resolve_db_path(None, &config).unwrap();
    assert_eq!(from_config, PathBuf::from("/data/from-config.db"));
}

#[test]
fn add_note_queues_locally_while_offline() {
    let (coordinator, _dir) = offline_engine();

    let entry = add_note(
        &coordinator,
        &words("Trip plan"),
        Some("Book the train".to_string()),
        vec!["#Travel".to_string()],
        Some("personal".to_string()),
    )
    .unwrap();

    assert_eq!(entry.title, "Trip plan");
    assert_eq!(entry.sync_status, SyncStatus::Pending);
    assert!(entry.tags.contains("travel"));
    assert_eq!(entry.collection_id.as_deref(), Some("personal"));

    let status = coordinator.status().unwrap();
    assert!(!status.online);
    assert_eq!(status.queued, 1);
}

#[test]
fn add_note_rejects_blank_title() {
    let (coordinator, _dir) = offline_engine();
    let error = add_note(&coordinator, &words("   "), None, Vec::new(), None).unwrap_err();
    assert!(matches!(error, CliError::EmptyTitle));
    assert_eq!(coordinator.status().unwrap().queued, 0);
}

#[test]
fn resolve_note_accepts_full_id_and_unique_prefix() {
    let (coordinator, _dir) = offline_engine();
    let entry = add_note(&coordinator, &words("Only note"), None, Vec::new(), None).unwrap();
    let full_id = entry.id.to_string();

    assert_eq!(resolve_note(&full_id, &coordinator).unwrap().id, entry.id);
    assert_eq!(
        resolve_note(&short_id(&entry.id).to_uppercase(), &coordinator)
            .unwrap()
            .id,
        entry.id
    );
}

#[test]
fn resolve_note_reports_ambiguous_and_missing() {
    let (coordinator, _dir) = offline_engine();
    let first = add_note(&coordinator, &words("First"), None, Vec::new(), None).unwrap();
    let second = add_note(&coordinator, &words("Second"), None, Vec::new(), None).unwrap();

    let first_id = first.id.to_string();
    let second_id = second.id.to_string();
    let common = first_id
        .chars()
        .zip(second_id.chars())
        .take_while(|(left, right)| left == right)
        .map(|(left, _)| left)
        .collect::<String>();

    let error = resolve_note(&common, &coordinator).unwrap_err();
    assert!(matches!(error, CliError::AmbiguousNoteId(_)));

    let error = resolve_note("ffffffff", &coordinator).unwrap_err();
    assert!(matches!(error, CliError::NoteNotFound(_)));

    let error = resolve_note("  ", &coordinator).unwrap_err();
    assert!(matches!(error, CliError::EmptyNoteId));
}

#[test]
fn patch_from_args_maps_collection_flags() {
    assert!(patch_from_args(None, None, None, None, false).is_empty());

    let cleared = patch_from_args(None, None, None, None, true);
    assert_eq!(cleared.collection_id, Some(None));

    let moved = patch_from_args(
        Some("New".to_string()),
        None,
        Some(vec!["a".to_string()]),
        Some("inbox".to_string()),
        false,
    );
    assert_eq!(moved.title.as_deref(), Some("New"));
    assert_eq!(moved.collection_id, Some(Some("inbox".to_string())));
}

#[test]
fn edit_and_delete_go_through_the_queue() {
    let (coordinator, _dir) = offline_engine();
    let entry = add_note(&coordinator, &words("Draft"), None, Vec::new(), None).unwrap();
    let prefix = entry.id.to_string();

    run_edit(&coordinator, &prefix, NotePatch::title("Final")).unwrap();
    let edited = coordinator.get(&entry.id).unwrap().unwrap();
    assert_eq!(edited.title, "Final");
    assert_eq!(edited.sync_status, SyncStatus::Pending);

    run_delete(&coordinator, &prefix).unwrap();
    assert!(coordinator.get(&entry.id).unwrap().is_none());
    assert_eq!(coordinator.status().unwrap().queued, 1);
}

#[test]
fn retry_without_rejections_is_a_no_op() {
    let (coordinator, _dir) = offline_engine();
    let entry = add_note(&coordinator, &words("Fine"), None, Vec::new(), None).unwrap();

    run_retry(&coordinator, &entry.id.to_string()).unwrap();
    assert_eq!(
        coordinator.get(&entry.id).unwrap().unwrap().sync_status,
        SyncStatus::Pending
    );
}

#[test]
fn notes_survive_reopening_the_database() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("quill.db");
    let config = EngineConfig::default();

    let id = {
        let coordinator = open_coordinator(&config, &db_path).unwrap();
        add_note(&coordinator, &words("Persistent"), None, Vec::new(), None)
            .unwrap()
            .id
    };

    let reopened = open_coordinator(&config, &db_path).unwrap();
    assert_eq!(reopened.get(&id).unwrap().unwrap().title, "Persistent");
    assert_eq!(reopened.status().unwrap().queued, 1);
}

#[test]
fn config_set_persists_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quill").join("config.json");

    let saved = set_config_values(
        &path,
        ConfigUpdates {
            remote_url: Some("https://notes.example.com/".to_string()),
            sync_interval_secs: Some(30),
            ..ConfigUpdates::default()
        },
    )
    .unwrap();

    assert_eq!(saved.remote_url, "https://notes.example.com");
    assert_eq!(saved.sync_interval_secs, 30);
    assert_eq!(EngineConfig::load_from_path(&path).unwrap(), saved);
}

#[test]
fn config_set_rejects_invalid_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");

    let result = set_config_values(
        &path,
        ConfigUpdates {
            remote_url: Some("notes.example.com".to_string()),
            ..ConfigUpdates::default()
        },
    );
    assert!(result.is_err());
    assert!(!path.exists());
}

#[test]
fn sync_report_lines_cover_both_phases() {
    let report = SyncReport {
        drain: Some(DrainReport {
            sent: 2,
            failed: 1,
            last_error: Some("connection reset".to_string()),
            ..DrainReport::default()
        }),
        pull: None,
        pull_error: Some("remote unavailable".to_string()),
    };

    assert_eq!(
        format_sync_report(&report),
        vec![
            "Pushed 2 change(s): 1 failed, 0 rejected, 0 held back".to_string(),
            "Last push error: connection reset".to_string(),
            "Pull failed: remote unavailable".to_string(),
        ]
    );
}

#[test]
fn status_lines_list_rejected_operations() {
    let target = NoteId::new();
    let status = SyncStatusSnapshot {
        online: false,
        draining: false,
        queued: 0,
        rejected: 1,
        last_pull_at: None,
        last_error: None,
    };
    let rejected = vec![Operation {
        sequence: 1,
        target_id: target,
        payload: OperationPayload::Delete,
        enqueued_at: 0,
        attempt_count: 1,
        state: OperationState::Rejected,
        last_error: Some("HTTP 403: forbidden".to_string()),
    }];

    let lines = format_status_lines(&status, &rejected);
    assert_eq!(lines[0], "connection: offline");
    assert_eq!(lines[3], "last pull:  never");
    assert!(lines[4].contains(&short_id(&target)));
    assert!(lines[4].ends_with("HTTP 403: forbidden"));
}

#[test]
fn watch_output_skips_quiet_events() {
    let id = NoteId::new();
    assert_eq!(format_event(&SyncEvent::IndexChanged { id }), None);
    assert_eq!(
        format_event(&SyncEvent::DrainFinished(DrainReport::default())),
        None
    );
    assert_eq!(
        format_event(&SyncEvent::PullFinished(PullReport {
            fetched: 3,
            inserted: 1,
            ..PullReport::default()
        })),
        Some("pulled 1 change(s) from 3 remote note(s)".to_string())
    );
    assert!(format_event(&SyncEvent::SyncFailed {
        id,
        message: "rejected".to_string()
    })
    .unwrap()
    .starts_with("sync failed for "));
}

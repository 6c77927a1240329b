//! Data models for Quill

mod entry;
mod note;
mod operation;

pub use entry::{IndexEntry, SyncStatus};
pub use note::{
    derive_preview, normalize_tags, NoteDraft, NoteId, NotePatch, NoteRecord, PREVIEW_MAX_CHARS,
};
pub use operation::{Operation, OperationKind, OperationPayload, OperationState};

//! Note model

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

/// Maximum number of characters kept in a derived preview
pub const PREVIEW_MAX_CHARS: usize = 30;

/// A unique identifier for a note, using UUID v7 (time-sortable)
///
/// Ids are allocated on the client so a created note keeps the same id
/// once the server has accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Create a new unique note ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// Full note document.
///
/// This is the body of an upsert and the shape of a remote snapshot. The
/// server echoes `updated_at` back verbatim, which makes it the
/// server-confirmed timestamp on pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: NoteId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub collection_id: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl NoteRecord {
    /// Build a new record from a draft, stamped with `now`
    #[must_use]
    pub fn from_draft(draft: NoteDraft, now: i64) -> Self {
        Self {
            id: NoteId::new(),
            title: draft.title.trim().to_string(),
            body: draft.body,
            tags: normalize_tags(draft.tags),
            collection_id: normalize_collection(draft.collection_id),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch into this record. Fields left `None` are untouched.
    pub fn apply(&mut self, patch: NotePatch) {
        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(body) = patch.body {
            self.body = body;
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(tags);
        }
        if let Some(collection_id) = patch.collection_id {
            self.collection_id = normalize_collection(collection_id);
        }
    }

    /// Short preview derived from the body
    #[must_use]
    pub fn preview(&self) -> String {
        derive_preview(&self.body)
    }

    /// Normalize tags and collection coming from an untrusted source
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.tags = normalize_tags(std::mem::take(&mut self.tags));
        self.collection_id = normalize_collection(self.collection_id.take());
        self
    }
}

/// Fields supplied by the caller when creating a note
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub collection_id: Option<String>,
}

impl NoteDraft {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_collection(mut self, collection_id: impl Into<String>) -> Self {
        self.collection_id = Some(collection_id.into());
        self
    }
}

/// Partial update of a note
///
/// `collection_id: Some(None)` clears the collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub collection_id: Option<Option<String>>,
}

impl NotePatch {
    #[must_use]
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Check if the patch changes nothing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.body.is_none()
            && self.tags.is_none()
            && self.collection_id.is_none()
    }
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_-]*$").expect("Invalid regex"))
}

/// Normalize a set of tags
///
/// Tags are trimmed, a leading `#` is dropped, and the result is lowercased
/// and deduplicated. Names that do not match `[a-z][a-z0-9_-]*` are skipped.
///
/// # Examples
///
/// ```
/// use quill_core::models::normalize_tags;
///
/// let tags = normalize_tags(["#Rust", "rust", " work "]);
/// assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["rust", "work"]);
/// ```
#[must_use]
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|tag| {
            tag.as_ref()
                .trim()
                .trim_start_matches('#')
                .to_lowercase()
        })
        .filter(|tag| tag_pattern().is_match(tag))
        .collect()
}

/// Derive the list preview from a note body: the first non-blank line,
/// truncated to [`PREVIEW_MAX_CHARS`] characters.
#[must_use]
pub fn derive_preview(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .chars()
        .take(PREVIEW_MAX_CHARS)
        .collect()
}

fn normalize_collection(value: Option<String>) -> Option<String> {
    crate::util::normalize_text_option(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_id_unique() {
        let id1 = NoteId::new();
        let id2 = NoteId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_note_id_parse() {
        let id = NoteId::new();
        let parsed: NoteId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_record_from_draft() {
        let draft = NoteDraft::new("  Draft  ")
            .with_body("Hello")
            .with_tags(["Work", "#work", "home"])
            .with_collection("  ");
        let record = NoteRecord::from_draft(draft, 42);

        assert_eq!(record.title, "Draft");
        assert_eq!(record.created_at, 42);
        assert_eq!(record.updated_at, 42);
        assert_eq!(record.tags.len(), 2);
        assert!(record.tags.contains("work"));
        assert_eq!(record.collection_id, None);
    }

    #[test]
    fn test_apply_patch() {
        let mut record = NoteRecord::from_draft(
            NoteDraft::new("Title").with_collection("inbox"),
            1,
        );
        record.apply(NotePatch {
            body: Some("new body".to_string()),
            collection_id: Some(None),
            ..NotePatch::default()
        });

        assert_eq!(record.title, "Title");
        assert_eq!(record.body, "new body");
        assert_eq!(record.collection_id, None);
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(NotePatch::default().is_empty());
        assert!(!NotePatch::title("x").is_empty());
    }

    #[test]
    fn test_normalize_tags_rejects_invalid() {
        // Tags starting with numbers are invalid
        let tags = normalize_tags(["123", "456test", "", "ok-tag"]);
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["ok-tag"]);
    }

    #[test]
    fn test_derive_preview() {
        assert_eq!(derive_preview("\n\n  First line  \nSecond"), "First line");
        assert_eq!(derive_preview(""), "");

        let long = "a".repeat(100);
        assert_eq!(derive_preview(&long).chars().count(), PREVIEW_MAX_CHARS);
    }

    #[test]
    fn test_record_deserializes_with_defaults() {
        let id = NoteId::new();
        let json = format!(
            r#"{{"id":"{id}","title":"t","created_at":1,"updated_at":2}}"#
        );
        let record: NoteRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.body, "");
        assert!(record.tags.is_empty());
    }
}

//! On-disk journal of everything that happened to sample entries.
//!
//! One pretty-printed JSON file per event, laid out by UTC date. Files are
//! created with `create_new`, so an event id can never be written twice and
//! existing files are never rewritten.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

pub const JOURNAL_DIR: &str = ".mill/journal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    EntryCreated,
    StatusChanged,
    StageRecorded,
    InspectionAdded,
    LedgerPosted,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::EntryCreated => "entry.created",
            EventKind::StatusChanged => "entry.status_changed",
            EventKind::StageRecorded => "entry.stage_recorded",
            EventKind::InspectionAdded => "entry.inspection_added",
            EventKind::LedgerPosted => "ledger.posted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEvent {
    pub event_id: String,
    pub occurred_at: String,
    pub entry_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub actor_user: String,
    pub actor_role: String,
    pub data: Value,
}

impl JournalEvent {
    pub fn with_identity(
        event_id: impl Into<String>,
        occurred_at: impl Into<String>,
        entry_id: impl Into<String>,
        kind: EventKind,
        actor: (&str, &str),
        data: Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            occurred_at: occurred_at.into(),
            entry_id: entry_id.into(),
            event_type: kind.as_str().to_string(),
            actor_user: actor.0.to_string(),
            actor_role: actor.1.to_string(),
            data,
        }
    }

    pub fn relative_path(&self) -> Result<PathBuf, EventWriteError> {
        relative_path_for_event(&self.occurred_at, &self.event_id, &self.event_type)
    }
}

#[derive(Debug, Clone)]
pub struct EventWriter {
    root: PathBuf,
}

impl EventWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn write(&self, event: &JournalEvent) -> Result<PathBuf, EventWriteError> {
        let rel_path = event.relative_path()?;
        let abs_path = self.root.join(&rel_path);
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&abs_path)?;
        serde_json::to_writer_pretty(&mut file, event)?;
        file.write_all(b"\n")?;
        file.sync_all()?;

        tracing::debug!(path = %rel_path.display(), "journal event written");
        Ok(rel_path)
    }

    pub fn read(&self, rel_path: &Path) -> Result<JournalEvent, EventWriteError> {
        let bytes = fs::read(self.root.join(rel_path))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Removes events written for a change that was then rolled back.
    pub fn discard(&self, rel_paths: &[PathBuf]) {
        for rel_path in rel_paths {
            if let Err(err) = fs::remove_file(self.root.join(rel_path)) {
                tracing::warn!(
                    path = %rel_path.display(),
                    error = %err,
                    "failed to discard journal event"
                );
            }
        }
    }
}

pub fn relative_path_for_event(
    occurred_at: &str,
    event_id: &str,
    event_type: &str,
) -> Result<PathBuf, EventWriteError> {
    validate_filename_component("event_id", event_id)?;
    validate_filename_component("event_type", event_type)?;

    let timestamp = OffsetDateTime::parse(occurred_at, &Rfc3339).map_err(|source| {
        EventWriteError::InvalidTimestamp {
            value: occurred_at.to_string(),
            source,
        }
    })?;

    Ok(Path::new(JOURNAL_DIR)
        .join(format!("{:04}", timestamp.year()))
        .join(format!("{:02}", u8::from(timestamp.month())))
        .join(format!("{:02}", timestamp.day()))
        .join(format!("{event_id}-{event_type}.json")))
}

pub fn new_event_id() -> String {
    Uuid::now_v7().to_string()
}

pub fn now_utc_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .expect("RFC3339 formatting for UTC timestamp should never fail")
}

fn validate_filename_component(field: &'static str, value: &str) -> Result<(), EventWriteError> {
    let is_valid = !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));

    if is_valid {
        Ok(())
    } else {
        Err(EventWriteError::InvalidFileComponent {
            field,
            value: value.to_string(),
        })
    }
}

#[derive(Debug, Error)]
pub enum EventWriteError {
    #[error("invalid RFC3339 timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        source: time::error::Parse,
    },
    #[error("invalid {field} '{value}': use only ASCII letters, numbers, '.', '-', '_'")]
    InvalidFileComponent { field: &'static str, value: String },
    #[error("I/O error on journal event: {0}")]
    Io(#[from] std::io::Error),
    #[error("journal event JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::{
        relative_path_for_event, EventKind, EventWriteError, EventWriter, JournalEvent,
    };
    use serde_json::json;
    use std::error::Error;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn unique_tmp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("millflow-events-{}", Uuid::now_v7()))
    }

    fn sample_event() -> JournalEvent {
        JournalEvent::with_identity(
            "018f4f7f-7dc7-7f4e-954b-64f8a2273ec8",
            "2026-02-22T17:00:00Z",
            "S-123",
            EventKind::StatusChanged,
            ("ravi", "manager"),
            json!({"from": "quality_check", "to": "lot_selection"}),
        )
    }

    #[test]
    fn builds_date_partitioned_path() {
        let path = relative_path_for_event(
            "2026-02-22T17:00:00Z",
            "018f4f7f-7dc7-7f4e-954b-64f8a2273ec8",
            EventKind::StageRecorded.as_str(),
        )
        .expect("path should build");
        assert_eq!(
            path.to_string_lossy(),
            ".mill/journal/2026/02/22/018f4f7f-7dc7-7f4e-954b-64f8a2273ec8-entry.stage_recorded.json"
        );
    }

    #[test]
    fn writes_once_and_reads_back() {
        let root = unique_tmp_dir();
        let writer = EventWriter::new(&root);
        let event = sample_event();

        let relative = writer.write(&event).expect("first write should succeed");
        let saved = writer.read(&relative).expect("event should read back");
        assert_eq!(saved, event);
        assert_eq!(saved.event_type, "entry.status_changed");

        let second = writer.write(&event).expect_err("rewrite should be refused");
        assert!(matches!(second, EventWriteError::Io(_)));

        writer.discard(std::slice::from_ref(&relative));
        assert!(!root.join(&relative).exists());
        writer
            .write(&event)
            .expect("write after discard should succeed");

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn rejects_path_traversal_and_bad_timestamps() {
        assert!(matches!(
            relative_path_for_event("2026-02-22T17:00:00Z", "../etc", "entry.created"),
            Err(EventWriteError::InvalidFileComponent {
                field: "event_id",
                ..
            })
        ));
        let err = relative_path_for_event("yesterday", "evt", "entry.created")
            .expect_err("timestamp should be rejected");
        assert!(matches!(err, EventWriteError::InvalidTimestamp { .. }));
        assert!(err.source().is_some());
    }
}

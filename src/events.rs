//! Change events delivered by the document store and the object store
//!
//! Delivery is at-least-once and unordered, every handler has to cope with that

use std::time::Duration;

use moka::future::Cache;
use serde::Deserialize;

use crate::mirror::sync_public_note;
use crate::notes::NoteSnapshot;
use crate::statistics::record_note_written;
use crate::storage::Storage;

/// How long a delivered event ID is remembered
const LEDGER_TIME_TO_LIVE: Duration = Duration::from_secs(10 * 60);

/// How many delivered event IDs are remembered at most
const LEDGER_CAPACITY: u64 = 100_000;

/// A write to `users/{owner}/notes/{note}`
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteWritten {
    pub owner_id: String,
    pub note_id: String,

    /// The document before the write, absent when it was created
    #[serde(default)]
    pub before: Option<NoteSnapshot>,

    /// The document after the write, absent when it was deleted
    #[serde(default)]
    pub after: Option<NoteSnapshot>,
}

/// What a write did to the existence of a document
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl NoteWritten {
    /// `None` when neither side exists, which the store should never deliver
    pub fn kind(&self) -> Option<ChangeKind> {
        match (&self.before, &self.after) {
            (None, Some(_)) => Some(ChangeKind::Created),
            (Some(_), Some(_)) => Some(ChangeKind::Updated),
            (Some(_), None) => Some(ChangeKind::Deleted),
            (None, None) => None,
        }
    }
}

/// An object finalized in, or deleted from, the object store
#[derive(Clone, Debug, Deserialize)]
pub struct StoredObject {
    /// Full path of the object in the bucket
    pub name: String,

    /// Size of the object in bytes
    #[serde(default)]
    pub size: ObjectSize,
}

/// Object size, storage notifications send it as a string
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ObjectSize {
    Number(u64),
    Text(String),
}

impl Default for ObjectSize {
    fn default() -> Self {
        Self::Number(0)
    }
}

impl ObjectSize {
    /// Size in bytes, `None` when the text is not a number
    pub fn bytes(&self) -> Option<u64> {
        match self {
            ObjectSize::Number(size) => Some(*size),
            ObjectSize::Text(size) => size.trim().parse().ok(),
        }
    }
}

impl StoredObject {
    /// Size in bytes, an unreadable size counts as empty
    pub fn bytes(&self) -> u64 {
        self.size.bytes().unwrap_or_else(|| {
            tracing::warn!(
                "Invalid size {:?} of object {}, counting as 0 bytes",
                self.size,
                self.name
            );

            0
        })
    }
}

/// Run every handler triggered by a note write
///
/// The handlers are independent of each other and never fail the caller
pub async fn dispatch_note_written<S: Storage>(storage: &S, change: &NoteWritten) {
    tokio::join!(
        record_note_written(storage, change),
        sync_public_note(storage, change),
    );
}

/// Recently delivered event IDs
///
/// Drops redeliveries of the same event within this process. Best-effort only: events
/// without an ID, redeliveries after the time to live, and redeliveries to another
/// process are all handled again.
#[derive(Clone)]
pub struct EventLedger {
    delivered: Cache<String, ()>,
}

impl EventLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self {
            delivered: Cache::builder()
                .max_capacity(LEDGER_CAPACITY)
                .time_to_live(LEDGER_TIME_TO_LIVE)
                .build(),
        }
    }

    /// Register a delivery, `true` when the event was not seen before
    ///
    /// `stream` keeps the IDs of different event sources apart
    pub async fn first_delivery(&self, stream: &str, event_id: &str) -> bool {
        self.delivered
            .entry(format!("{stream}:{event_id}"))
            .or_insert(())
            .await
            .is_fresh()
    }
}

//! Statistics summary of an owner
//!
//! Derived from note and stored object lifecycle events, never written by the owner.
//! All changes go through [`Storage::increment_statistics`], the handlers here only
//! decide which delta an event stands for.

use chrono::NaiveDateTime;

use crate::events::ChangeKind;
use crate::events::NoteWritten;
use crate::events::StoredObject;
use crate::storage::Storage;

/// Statistics summary, as kept in storage
///
/// The counters are raw sums of all deltas, and can be negative when a delete was
/// delivered before its create. Use the accessors to read them.
#[derive(Clone, Debug, Default)]
pub struct Statistics {
    pub note_count: i64,
    pub image_count: i64,
    pub total_image_size: i64,
    pub last_updated: Option<NaiveDateTime>,
}

impl Statistics {
    /// Number of notes, never negative
    pub fn note_count(&self) -> u64 {
        clamp(self.note_count)
    }

    /// Number of stored images, never negative
    pub fn image_count(&self) -> u64 {
        clamp(self.image_count)
    }

    /// Total size of the stored images in bytes, never negative
    pub fn total_image_size(&self) -> u64 {
        clamp(self.total_image_size)
    }

    /// Add a delta to the raw sums
    pub fn apply(&mut self, delta: &StatisticsDelta, now: NaiveDateTime) {
        self.note_count = self.note_count.saturating_add(delta.note_count);
        self.image_count = self.image_count.saturating_add(delta.image_count);
        self.total_image_size = self.total_image_size.saturating_add(delta.total_image_size);
        self.last_updated = Some(now);
    }
}

fn clamp(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Change to apply on a statistics summary
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatisticsDelta {
    pub note_count: i64,
    pub image_count: i64,
    pub total_image_size: i64,
}

impl StatisticsDelta {
    /// A note is created
    pub fn note_created() -> Self {
        Self {
            note_count: 1,
            ..Self::default()
        }
    }

    /// A note is deleted
    pub fn note_deleted() -> Self {
        Self {
            note_count: -1,
            ..Self::default()
        }
    }

    /// An image of `size` bytes is stored
    pub fn image_stored(size: u64) -> Self {
        Self {
            image_count: 1,
            total_image_size: i64::try_from(size).unwrap_or(i64::MAX),
            ..Self::default()
        }
    }

    /// An image of `size` bytes is deleted
    pub fn image_deleted(size: u64) -> Self {
        Self {
            image_count: -1,
            total_image_size: -i64::try_from(size).unwrap_or(i64::MAX),
            ..Self::default()
        }
    }

    /// The delta as the first values of a new summary
    pub fn clamped(&self) -> Self {
        Self {
            note_count: self.note_count.max(0),
            image_count: self.image_count.max(0),
            total_image_size: self.total_image_size.max(0),
        }
    }
}

/// Keep the note count in line with a note write
///
/// Updates of an existing note leave the count alone
pub async fn record_note_written<S: Storage>(storage: &S, change: &NoteWritten) {
    let delta = match change.kind() {
        Some(ChangeKind::Created) => {
            tracing::info!(
                "Note created for user {}, note {}, incrementing count",
                change.owner_id,
                change.note_id
            );

            StatisticsDelta::note_created()
        }
        Some(ChangeKind::Deleted) => {
            tracing::info!(
                "Note deleted for user {}, note {}, decrementing count",
                change.owner_id,
                change.note_id
            );

            StatisticsDelta::note_deleted()
        }
        Some(ChangeKind::Updated) | None => return,
    };

    apply_delta(storage, &change.owner_id, &delta).await;
}

/// Count a newly stored object
pub async fn record_object_finalized<S: Storage>(storage: &S, object: &StoredObject) {
    record_object(storage, object, false).await;
}

/// Uncount a deleted object
pub async fn record_object_deleted<S: Storage>(storage: &S, object: &StoredObject) {
    record_object(storage, object, true).await;
}

async fn record_object<S: Storage>(storage: &S, object: &StoredObject, is_deletion: bool) {
    let size = object.bytes();

    tracing::info!(
        "Processing {} of object {} of size {size}",
        if is_deletion { "deletion" } else { "creation" },
        object.name
    );

    let Some(owner_id) = owner_from_object_path(&object.name) else {
        tracing::info!(
            "Object {} does not match `users/{{owner}}/...`, skipping statistics",
            object.name
        );

        return;
    };

    let delta = if is_deletion {
        StatisticsDelta::image_deleted(size)
    } else {
        StatisticsDelta::image_stored(size)
    };

    apply_delta(storage, owner_id, &delta).await;
}

/// Apply a delta, never fails the caller
///
/// When the increment fails the summary is created if it is missing, anything else is
/// only logged. Retrying is left to the event system.
async fn apply_delta<S: Storage>(storage: &S, owner_id: &str, delta: &StatisticsDelta) {
    let Err(err) = storage.increment_statistics(owner_id, delta).await else {
        tracing::debug!("Updated statistics for user {owner_id}: {delta:?}");

        return;
    };

    tracing::error!("Failed to update statistics for user {owner_id}: {err}");

    match storage.initialize_statistics(owner_id, delta).await {
        Ok(true) => {
            tracing::info!("Statistics for user {owner_id} did not exist, created them");
        }
        Ok(false) => {
            tracing::error!("Update failed even though statistics for user {owner_id} exist");
        }
        Err(err) => {
            tracing::error!("Could not create statistics for user {owner_id}: {err}");
        }
    }
}

/// Get the owner from an object path: `users/{owner}/...`
///
/// The web client stores its files below `note/`, that prefix is accepted as well
pub fn owner_from_object_path(path: &str) -> Option<&str> {
    let path = path.strip_prefix("note/").unwrap_or(path);

    let mut parts = path.split('/');

    if parts.next() != Some("users") {
        return None;
    }

    parts.next().filter(|owner_id| !owner_id.is_empty())
}

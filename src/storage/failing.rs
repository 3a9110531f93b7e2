//! Storage for tests that fails selected operations
//!
//! Everything else is passed on to a memory storage

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use chrono::NaiveDateTime;

use crate::access_logs::AccessLog;
use crate::access_logs::NoteReadStatus;
use crate::mirror::PublicNote;
use crate::notes::Note;
use crate::statistics::Statistics;
use crate::statistics::StatisticsDelta;

use super::CreateAccessLogValues;
use super::CreateNoteValues;
use super::Error;
use super::Memory;
use super::Result;
use super::Storage;
use super::UpdateNoteValues;

/// Operations that can be made to fail
#[derive(Debug, Default)]
struct Failures {
    increment_statistics: AtomicBool,
    find_public_note: AtomicBool,
    upsert_public_note: AtomicBool,
}

/// A memory storage with switchable failures
#[derive(Clone, Debug)]
pub struct Failing {
    inner: Memory,
    failures: Arc<Failures>,
}

impl Failing {
    pub fn new() -> Self {
        Self {
            inner: Memory::new(),
            failures: Arc::new(Failures::default()),
        }
    }

    pub fn fail_increment_statistics(&self) {
        self.failures
            .increment_statistics
            .store(true, Ordering::SeqCst);
    }

    pub fn fail_find_public_note(&self) {
        self.failures.find_public_note.store(true, Ordering::SeqCst);
    }

    pub fn fail_upsert_public_note(&self) {
        self.failures
            .upsert_public_note
            .store(true, Ordering::SeqCst);
    }
}

fn check(failure: &AtomicBool, operation: &str) -> Result<()> {
    if failure.load(Ordering::SeqCst) {
        return Err(Error::Connection(format!("{operation} is unavailable")));
    }

    Ok(())
}

impl Storage for Failing {
    async fn find_all_notes_by_owner(&self, owner_id: &str) -> Result<Vec<Note>> {
        self.inner.find_all_notes_by_owner(owner_id).await
    }

    async fn find_single_note_by_id(&self, owner_id: &str, note_id: &str) -> Result<Option<Note>> {
        self.inner.find_single_note_by_id(owner_id, note_id).await
    }

    async fn create_note(&self, owner_id: &str, values: &CreateNoteValues<'_>) -> Result<Note> {
        self.inner.create_note(owner_id, values).await
    }

    async fn update_note(
        &self,
        note: &Note,
        values: &UpdateNoteValues<'_>,
    ) -> Result<Option<Note>> {
        self.inner.update_note(note, values).await
    }

    async fn delete_note(&self, note: &Note) -> Result<()> {
        self.inner.delete_note(note).await
    }

    async fn find_statistics(&self, owner_id: &str) -> Result<Option<Statistics>> {
        self.inner.find_statistics(owner_id).await
    }

    async fn increment_statistics(&self, owner_id: &str, delta: &StatisticsDelta) -> Result<()> {
        check(&self.failures.increment_statistics, "increment_statistics")?;

        self.inner.increment_statistics(owner_id, delta).await
    }

    async fn initialize_statistics(&self, owner_id: &str, delta: &StatisticsDelta) -> Result<bool> {
        self.inner.initialize_statistics(owner_id, delta).await
    }

    async fn find_public_note(&self, note_id: &str) -> Result<Option<PublicNote>> {
        check(&self.failures.find_public_note, "find_public_note")?;

        self.inner.find_public_note(note_id).await
    }

    async fn upsert_public_note(&self, public_note: &PublicNote) -> Result<()> {
        check(&self.failures.upsert_public_note, "upsert_public_note")?;

        self.inner.upsert_public_note(public_note).await
    }

    async fn delete_public_note(&self, note_id: &str) -> Result<bool> {
        self.inner.delete_public_note(note_id).await
    }

    async fn create_access_log(&self, values: &CreateAccessLogValues<'_>) -> Result<AccessLog> {
        self.inner.create_access_log(values).await
    }

    async fn find_all_access_logs_by_note(
        &self,
        owner_id: &str,
        note_id: &str,
    ) -> Result<Vec<AccessLog>> {
        self.inner
            .find_all_access_logs_by_note(owner_id, note_id)
            .await
    }

    async fn save_read_status(
        &self,
        owner_id: &str,
        note_id: &str,
        read_at: NaiveDateTime,
    ) -> Result<()> {
        self.inner.save_read_status(owner_id, note_id, read_at).await
    }

    async fn find_read_status(
        &self,
        owner_id: &str,
        note_id: &str,
    ) -> Result<Option<NoteReadStatus>> {
        self.inner.find_read_status(owner_id, note_id).await
    }
}

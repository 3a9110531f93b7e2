//! Memory storage
//!
//! Will be destroyed on system shutdown

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::access_logs::AccessLog;
use crate::access_logs::NoteReadStatus;
use crate::mirror::PublicNote;
use crate::notes::Note;
use crate::statistics::Statistics;
use crate::statistics::StatisticsDelta;

use super::CreateAccessLogValues;
use super::CreateNoteValues;
use super::Result;
use super::Storage;
use super::UpdateNoteValues;

/// Key of a record below an owner: (owner ID, note ID)
type OwnedKey = (String, String);

/// An in-memory storage
///
/// Will be destroyed on system shutdown
#[derive(Clone, Debug)]
pub struct Memory {
    /// All notes in storage
    notes: Arc<Mutex<HashMap<OwnedKey, Note>>>,

    /// Statistics summary per owner
    statistics: Arc<Mutex<HashMap<String, Statistics>>>,

    /// Public copies, by note ID
    public_notes: Arc<Mutex<HashMap<String, PublicNote>>>,

    /// All access logs, in order of creation
    access_logs: Arc<Mutex<Vec<AccessLog>>>,

    /// Read status per note
    read_statuses: Arc<Mutex<HashMap<OwnedKey, NoteReadStatus>>>,
}

impl Memory {
    /// Create a new empty Memory storage
    pub fn new() -> Self {
        Self {
            notes: Arc::new(Mutex::new(HashMap::new())),
            statistics: Arc::new(Mutex::new(HashMap::new())),
            public_notes: Arc::new(Mutex::new(HashMap::new())),
            access_logs: Arc::new(Mutex::new(Vec::new())),
            read_statuses: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

fn owned_key(owner_id: &str, note_id: &str) -> OwnedKey {
    (owner_id.to_string(), note_id.to_string())
}

impl Storage for Memory {
    async fn find_all_notes_by_owner(&self, owner_id: &str) -> Result<Vec<Note>> {
        let mut notes = self
            .notes
            .lock()
            .await
            .values()
            .filter(|note| note.owner_id == owner_id)
            .cloned()
            .collect::<Vec<_>>();

        notes.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(notes)
    }

    async fn find_single_note_by_id(&self, owner_id: &str, note_id: &str) -> Result<Option<Note>> {
        Ok(self
            .notes
            .lock()
            .await
            .get(&owned_key(owner_id, note_id))
            .cloned())
    }

    async fn create_note(&self, owner_id: &str, values: &CreateNoteValues<'_>) -> Result<Note> {
        let now = Utc::now().naive_utc();

        let note = Note {
            id: Uuid::new_v4().simple().to_string(),
            owner_id: owner_id.to_string(),
            title: values.title.to_string(),
            tags: values.tags.to_vec(),
            description: values.description.map(ToString::to_string),
            image_url: values.image_url.map(ToString::to_string),
            is_public: values.is_public,
            public_password: values.public_password.map(ToString::to_string),
            created_at: now,
            last_modified: now,
        };

        self.notes
            .lock()
            .await
            .insert(owned_key(owner_id, &note.id), note.clone());

        Ok(note)
    }

    async fn update_note(
        &self,
        note: &Note,
        values: &UpdateNoteValues<'_>,
    ) -> Result<Option<Note>> {
        let mut notes = self.notes.lock().await;

        let Some(note) = notes.get_mut(&owned_key(&note.owner_id, &note.id)) else {
            return Ok(None);
        };

        values.apply_to(note);
        note.last_modified = Utc::now().naive_utc();

        Ok(Some(note.clone()))
    }

    async fn delete_note(&self, note: &Note) -> Result<()> {
        let key = owned_key(&note.owner_id, &note.id);

        self.notes.lock().await.remove(&key);
        self.read_statuses.lock().await.remove(&key);
        self.access_logs
            .lock()
            .await
            .retain(|access_log| access_log.owner_id != note.owner_id || access_log.note_id != note.id);

        Ok(())
    }

    async fn find_statistics(&self, owner_id: &str) -> Result<Option<Statistics>> {
        Ok(self.statistics.lock().await.get(owner_id).cloned())
    }

    async fn increment_statistics(&self, owner_id: &str, delta: &StatisticsDelta) -> Result<()> {
        self.statistics
            .lock()
            .await
            .entry(owner_id.to_string())
            .or_default()
            .apply(delta, Utc::now().naive_utc());

        Ok(())
    }

    async fn initialize_statistics(&self, owner_id: &str, delta: &StatisticsDelta) -> Result<bool> {
        let mut statistics = self.statistics.lock().await;

        if statistics.contains_key(owner_id) {
            return Ok(false);
        }

        let mut initial = Statistics::default();
        initial.apply(&delta.clamped(), Utc::now().naive_utc());

        statistics.insert(owner_id.to_string(), initial);

        Ok(true)
    }

    async fn find_public_note(&self, note_id: &str) -> Result<Option<PublicNote>> {
        Ok(self.public_notes.lock().await.get(note_id).cloned())
    }

    async fn upsert_public_note(&self, public_note: &PublicNote) -> Result<()> {
        self.public_notes
            .lock()
            .await
            .insert(public_note.note_id.clone(), public_note.clone());

        Ok(())
    }

    async fn delete_public_note(&self, note_id: &str) -> Result<bool> {
        Ok(self.public_notes.lock().await.remove(note_id).is_some())
    }

    async fn create_access_log(&self, values: &CreateAccessLogValues<'_>) -> Result<AccessLog> {
        let access_log = AccessLog {
            id: Uuid::new_v4(),
            owner_id: values.owner_id.to_string(),
            note_id: values.note_id.to_string(),
            kind: values.kind.to_string(),
            location: values.location.map(ToString::to_string),
            client_info: values.client_info.cloned(),
            server_ip: values.server_ip.copied(),
            created_at: Utc::now().naive_utc(),
        };

        self.access_logs.lock().await.push(access_log.clone());

        Ok(access_log)
    }

    async fn find_all_access_logs_by_note(
        &self,
        owner_id: &str,
        note_id: &str,
    ) -> Result<Vec<AccessLog>> {
        Ok(self
            .access_logs
            .lock()
            .await
            .iter()
            .rev()
            .filter(|access_log| access_log.owner_id == owner_id && access_log.note_id == note_id)
            .cloned()
            .collect())
    }

    async fn save_read_status(
        &self,
        owner_id: &str,
        note_id: &str,
        read_at: NaiveDateTime,
    ) -> Result<()> {
        self.read_statuses.lock().await.insert(
            owned_key(owner_id, note_id),
            NoteReadStatus {
                last_read_at: read_at,
            },
        );

        Ok(())
    }

    async fn find_read_status(
        &self,
        owner_id: &str,
        note_id: &str,
    ) -> Result<Option<NoteReadStatus>> {
        Ok(self
            .read_statuses
            .lock()
            .await
            .get(&owned_key(owner_id, note_id))
            .cloned())
    }
}

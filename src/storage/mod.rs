//! All things related to the storage of notes and their derived records
//!
//! Layout as seen by the document store:
//! - `users/{owner}/notes/{note}`
//! - `users/{owner}/notes/{note}/accessLogs/{log}`
//! - `users/{owner}/noteReadStatus/{note}`
//! - `users/{owner}/statistics/summary`
//! - `publicNotes/{note}`

use core::fmt;
use std::future::Future;
use std::net::IpAddr;

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::access_logs::AccessLog;
use crate::access_logs::NoteReadStatus;
use crate::mirror::PublicNote;
use crate::notes::Note;
use crate::statistics::Statistics;
use crate::statistics::StatisticsDelta;

#[cfg(test)]
pub use failing::Failing;
#[cfg(any(test, not(feature = "postgres")))]
pub use memory::Memory;
#[cfg(feature = "postgres")]
pub use postgres::Postgres;

#[cfg(test)]
mod failing;
#[cfg(any(test, not(feature = "postgres")))]
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

/// Setup the storage
#[cfg(not(feature = "postgres"))]
#[allow(clippy::unused_async)]
pub async fn setup() -> Result<Memory> {
    Ok(Memory::new())
}

/// Setup the storage
#[cfg(feature = "postgres")]
pub async fn setup() -> Result<Postgres> {
    Postgres::new().await
}

/// Storage errors
#[derive(Debug)]
pub enum Error {
    /// A connection error with the storage
    Connection(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Connection(error) => write!(f, "Connection error: {error}"),
        }
    }
}

/// Result type for all storage interactions
pub type Result<T> = core::result::Result<T, Error>;

/// Values to create a Note
pub struct CreateNoteValues<'a> {
    /// Title of the note, already normalized
    pub title: &'a str,

    /// Tags of the note, already normalized
    pub tags: &'a [String],

    /// Optional description shown on the public page
    pub description: Option<&'a str>,

    /// Optional image shown on the public page
    pub image_url: Option<&'a str>,

    /// Is the note visible to the public
    pub is_public: bool,

    /// Hashed password for the public page
    pub public_password: Option<&'a str>,
}

/// Values to update a Note
///
/// `None` leaves the field as is, the inner `None` clears it
#[derive(Debug, Default)]
pub struct UpdateNoteValues<'a> {
    pub title: Option<&'a str>,
    pub tags: Option<&'a [String]>,
    pub description: Option<Option<&'a str>>,
    pub image_url: Option<Option<&'a str>>,
    pub is_public: Option<bool>,
    pub public_password: Option<Option<&'a str>>,
}

impl UpdateNoteValues<'_> {
    /// Write the given fields onto a note
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(title) = self.title {
            note.title = title.to_string();
        }

        if let Some(tags) = self.tags {
            note.tags = tags.to_vec();
        }

        if let Some(description) = self.description {
            note.description = description.map(ToString::to_string);
        }

        if let Some(image_url) = self.image_url {
            note.image_url = image_url.map(ToString::to_string);
        }

        if let Some(is_public) = self.is_public {
            note.is_public = is_public;
        }

        if let Some(public_password) = self.public_password {
            note.public_password = public_password.map(ToString::to_string);
        }
    }
}

/// Values to create an access log entry
pub struct CreateAccessLogValues<'a> {
    /// Owner of the note, and the user accessing it
    pub owner_id: &'a str,

    /// The accessed note
    pub note_id: &'a str,

    /// Kind of access: `read`, `link_copied`, `exported`, ...
    pub kind: &'a str,

    /// Where in the client the access happened
    pub location: Option<&'a str>,

    /// Whatever the client tells about itself
    pub client_info: Option<&'a Value>,

    /// IP address as seen by the server
    pub server_ip: Option<&'a IpAddr>,
}

/// Storage with all supported operations
pub trait Storage: Clone + Send + Sync + 'static {
    /// Find all notes of an owner
    fn find_all_notes_by_owner(
        &self,
        owner_id: &str,
    ) -> impl Future<Output = Result<Vec<Note>>> + Send;

    /// Find a single note of an owner
    fn find_single_note_by_id(
        &self,
        owner_id: &str,
        note_id: &str,
    ) -> impl Future<Output = Result<Option<Note>>> + Send;

    /// Create a note
    fn create_note(
        &self,
        owner_id: &str,
        values: &CreateNoteValues,
    ) -> impl Future<Output = Result<Note>> + Send;

    /// Update a note, bumps the last modified time
    ///
    /// Returns `None` when the note no longer exists
    fn update_note(
        &self,
        note: &Note,
        values: &UpdateNoteValues,
    ) -> impl Future<Output = Result<Option<Note>>> + Send;

    /// Delete a note, and everything below it
    fn delete_note(&self, note: &Note) -> impl Future<Output = Result<()>> + Send;

    /// Find the statistics summary of an owner
    fn find_statistics(
        &self,
        owner_id: &str,
    ) -> impl Future<Output = Result<Option<Statistics>>> + Send;

    /// Atomically add a delta to the statistics summary of an owner
    ///
    /// Creates the summary when it does not exist yet. The raw sums are kept, readers
    /// clamp them, so increments can be applied in any order.
    fn increment_statistics(
        &self,
        owner_id: &str,
        delta: &StatisticsDelta,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Create the statistics summary from a delta, only if it does not exist yet
    ///
    /// Negative values are stored as zero. Returns `false` when a summary already exists
    fn initialize_statistics(
        &self,
        owner_id: &str,
        delta: &StatisticsDelta,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Find a public note by the ID of its source note
    fn find_public_note(
        &self,
        note_id: &str,
    ) -> impl Future<Output = Result<Option<PublicNote>>> + Send;

    /// Replace (or create) a public note
    fn upsert_public_note(&self, public_note: &PublicNote)
    -> impl Future<Output = Result<()>> + Send;

    /// Delete a public note
    ///
    /// Returns `false` when there was nothing to delete
    fn delete_public_note(&self, note_id: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Register an access to a note
    fn create_access_log(
        &self,
        values: &CreateAccessLogValues,
    ) -> impl Future<Output = Result<AccessLog>> + Send;

    /// Find all access logs of a note, newest first
    fn find_all_access_logs_by_note(
        &self,
        owner_id: &str,
        note_id: &str,
    ) -> impl Future<Output = Result<Vec<AccessLog>>> + Send;

    /// Mark a note as read by its owner
    fn save_read_status(
        &self,
        owner_id: &str,
        note_id: &str,
        read_at: NaiveDateTime,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Find when a note was last read by its owner
    fn find_read_status(
        &self,
        owner_id: &str,
        note_id: &str,
    ) -> impl Future<Output = Result<Option<NoteReadStatus>>> + Send;
}

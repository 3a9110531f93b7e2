//! Notes and their snapshots as carried by change events

use chrono::naive::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

/// A private note of an owner
#[derive(Clone, Debug)]
pub struct Note {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_public: bool,

    /// Hashed password guarding the public page
    pub public_password: Option<String>,

    pub created_at: NaiveDateTime,
    pub last_modified: NaiveDateTime,
}

impl Note {
    /// Path of the note in the document store
    pub fn path(&self) -> String {
        format!("users/{}/notes/{}", self.owner_id, self.id)
    }

    /// Snapshot of the note as the document store would deliver it
    pub fn snapshot(&self) -> NoteSnapshot {
        NoteSnapshot {
            title: Some(self.title.clone()),
            tags: self.tags.clone(),
            description: self.description.clone(),
            image_url: self.image_url.clone(),
            is_public: self.is_public,
            public_password: self.public_password.clone(),
            last_modified: Some(self.last_modified),
        }
    }
}

/// The body of a note document before or after a write
///
/// Written by any client of the document store, so nothing is required
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NoteSnapshot {
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_public: bool,
    pub public_password: Option<String>,
    pub last_modified: Option<NaiveDateTime>,
}

impl NoteSnapshot {
    /// Does the snapshot carry a (non-blank) password?
    pub fn is_password_protected(&self) -> bool {
        self.public_password
            .as_deref()
            .is_some_and(|password| !password.trim().is_empty())
    }
}

/// Normalize a title: NFC and trimmed
pub fn normalize_title(title: &str) -> String {
    title.trim().nfc().collect()
}

/// Normalize tags: NFC, trimmed, without blanks or duplicates
///
/// Keeps the order in which the tags were given
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());

    for tag in tags {
        let tag = tag.trim().nfc().collect::<String>();

        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }

    normalized
}

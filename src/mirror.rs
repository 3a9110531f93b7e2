//! Public mirror of notes
//!
//! A note has a public copy in `publicNotes/{note}` if and only if it is visible. The
//! copy only holds what the public page needs, the password itself never leaves the
//! note.

use chrono::NaiveDateTime;
use chrono::Utc;

use crate::events::NoteWritten;
use crate::notes::NoteSnapshot;
use crate::storage::Storage;

const DEFAULT_TITLE: &str = "Untitled Note";
const DEFAULT_DESCRIPTION: &str = "This is a public note.";

/// Public copy of a visible note
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicNote {
    pub note_id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub password_protected: bool,
    pub last_updated_at: NaiveDateTime,
}

impl PublicNote {
    /// Denormalize a visible snapshot
    pub fn from_snapshot(owner_id: &str, note_id: &str, snapshot: &NoteSnapshot) -> Self {
        let title = snapshot
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(DEFAULT_TITLE);

        // line breaks are shown on the page, only blank descriptions are replaced
        let description = snapshot
            .description
            .as_deref()
            .filter(|description| !description.trim().is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION);

        let image_url = snapshot
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|image_url| !image_url.is_empty());

        Self {
            note_id: note_id.to_string(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            image_url: image_url.map(str::to_string),
            password_protected: snapshot.is_password_protected(),
            last_updated_at: snapshot
                .last_modified
                .unwrap_or_else(|| Utc::now().naive_utc()),
        }
    }
}

/// Mirror state of a note, driven purely by its visibility flag
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MirrorState {
    /// Visible, a public copy should exist
    Mirrored,

    /// Private or absent, no public copy should exist
    Unmirrored,
}

impl MirrorState {
    /// State belonging to one side of a write
    pub fn of(snapshot: Option<&NoteSnapshot>) -> Self {
        if snapshot.is_some_and(|snapshot| snapshot.is_public) {
            MirrorState::Mirrored
        } else {
            MirrorState::Unmirrored
        }
    }

    /// What to do with the public copy when moving to `next`
    pub fn transition(self, next: MirrorState) -> MirrorAction {
        match (self, next) {
            (_, MirrorState::Mirrored) => MirrorAction::Upsert,
            (MirrorState::Mirrored, MirrorState::Unmirrored) => MirrorAction::Delete,
            (MirrorState::Unmirrored, MirrorState::Unmirrored) => MirrorAction::Nothing,
        }
    }
}

/// Effect of a note write on its public copy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MirrorAction {
    /// Write (or refresh) the public copy
    Upsert,

    /// Remove the public copy
    Delete,

    /// Leave everything as is
    Nothing,
}

/// Keep the public copy of a note in line with a note write
///
/// Store failures are only logged: the next write of the note corrects the copy
pub async fn sync_public_note<S: Storage>(storage: &S, change: &NoteWritten) -> MirrorAction {
    let before = MirrorState::of(change.before.as_ref());
    let after = MirrorState::of(change.after.as_ref());

    let action = before.transition(after);

    let NoteWritten {
        owner_id, note_id, ..
    } = change;

    match action {
        MirrorAction::Upsert => {
            let Some(snapshot) = change.after.as_ref() else {
                return MirrorAction::Nothing;
            };

            tracing::info!("Note {note_id} of user {owner_id} is public, syncing public note");

            let public_note = PublicNote::from_snapshot(owner_id, note_id, snapshot);

            match storage.upsert_public_note(&public_note).await {
                Ok(()) => tracing::info!("Synced note {note_id} to public notes"),
                Err(err) => tracing::error!("Failed to sync note {note_id} to public notes: {err}"),
            }
        }
        MirrorAction::Delete => {
            tracing::info!(
                "Note {note_id} of user {owner_id} is no longer public, deleting public note"
            );

            match storage.delete_public_note(note_id).await {
                Ok(true) => tracing::info!("Deleted note {note_id} from public notes"),
                Ok(false) => {
                    tracing::warn!("Tried to delete public note {note_id}, but it was already gone");
                }
                Err(err) => {
                    tracing::error!("Failed to delete note {note_id} from public notes: {err}");
                }
            }
        }
        MirrorAction::Nothing => {}
    }

    action
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::storage::Memory;

    use super::*;

    fn snapshot(title: &str, is_public: bool) -> NoteSnapshot {
        NoteSnapshot {
            title: Some(title.to_string()),
            description: Some(format!("About {title}")),
            is_public,
            ..NoteSnapshot::default()
        }
    }

    fn change(before: Option<NoteSnapshot>, after: Option<NoteSnapshot>) -> NoteWritten {
        NoteWritten {
            owner_id: "owner".to_string(),
            note_id: "note".to_string(),
            before,
            after,
        }
    }

    #[test]
    fn test_transitions() {
        use MirrorState::Mirrored;
        use MirrorState::Unmirrored;

        assert_eq!(Unmirrored.transition(Mirrored), MirrorAction::Upsert);
        assert_eq!(Mirrored.transition(Unmirrored), MirrorAction::Delete);
        assert_eq!(Mirrored.transition(Mirrored), MirrorAction::Upsert);
        assert_eq!(Unmirrored.transition(Unmirrored), MirrorAction::Nothing);
    }

    #[test]
    fn test_state_of_snapshot() {
        assert_eq!(MirrorState::of(None), MirrorState::Unmirrored);
        assert_eq!(
            MirrorState::of(Some(&snapshot("a", false))),
            MirrorState::Unmirrored
        );
        assert_eq!(
            MirrorState::of(Some(&snapshot("a", true))),
            MirrorState::Mirrored
        );
    }

    #[test]
    fn test_from_snapshot() {
        let last_modified = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        let snapshot = NoteSnapshot {
            title: Some("  ".to_string()),
            image_url: Some("https://www.example.com/cat.png".to_string()),
            is_public: true,
            public_password: Some("hunter2".to_string()),
            last_modified: Some(last_modified),
            ..NoteSnapshot::default()
        };

        let public_note = PublicNote::from_snapshot("owner", "note", &snapshot);

        assert_eq!(public_note.note_id, "note");
        assert_eq!(public_note.owner_id, "owner");
        assert_eq!(public_note.title, DEFAULT_TITLE);
        assert_eq!(public_note.description, DEFAULT_DESCRIPTION);
        assert_eq!(
            public_note.image_url.as_deref(),
            Some("https://www.example.com/cat.png")
        );
        assert!(public_note.password_protected);
        assert_eq!(public_note.last_updated_at, last_modified);
    }

    #[test]
    fn test_from_snapshot_with_blank_fields() {
        let snapshot = NoteSnapshot {
            title: Some("Groceries".to_string()),
            description: Some(" \n ".to_string()),
            image_url: Some("".to_string()),
            is_public: true,
            ..NoteSnapshot::default()
        };

        let public_note = PublicNote::from_snapshot("owner", "note", &snapshot);

        assert_eq!(public_note.title, "Groceries");
        assert_eq!(public_note.description, DEFAULT_DESCRIPTION);
        assert_eq!(public_note.image_url, None);
        assert!(!public_note.password_protected);

        let snapshot = NoteSnapshot {
            description: Some("Milk\nEggs".to_string()),
            image_url: Some(" https://www.example.com/cat.png ".to_string()),
            ..snapshot
        };

        let public_note = PublicNote::from_snapshot("owner", "note", &snapshot);

        assert_eq!(public_note.description, "Milk\nEggs");
        assert_eq!(
            public_note.image_url.as_deref(),
            Some("https://www.example.com/cat.png")
        );
    }

    #[tokio::test]
    async fn test_publish_refresh_unpublish() {
        let storage = Memory::new();

        // private note is created: nothing
        let action = sync_public_note(&storage, &change(None, Some(snapshot("a", false)))).await;
        assert_eq!(action, MirrorAction::Nothing);
        assert!(storage.find_public_note("note").await.unwrap().is_none());

        // made public
        let action = sync_public_note(
            &storage,
            &change(Some(snapshot("a", false)), Some(snapshot("Recipes", true))),
        )
        .await;
        assert_eq!(action, MirrorAction::Upsert);

        let public_note = storage.find_public_note("note").await.unwrap().unwrap();
        assert_eq!(public_note.title, "Recipes");
        assert_eq!(public_note.description, "About Recipes");
        assert!(!public_note.password_protected);

        // public note is edited
        let action = sync_public_note(
            &storage,
            &change(Some(snapshot("Recipes", true)), Some(snapshot("Pasta", true))),
        )
        .await;
        assert_eq!(action, MirrorAction::Upsert);

        let public_note = storage.find_public_note("note").await.unwrap().unwrap();
        assert_eq!(public_note.title, "Pasta");

        // made private again
        let action = sync_public_note(
            &storage,
            &change(Some(snapshot("Pasta", true)), Some(snapshot("Pasta", false))),
        )
        .await;
        assert_eq!(action, MirrorAction::Delete);
        assert!(storage.find_public_note("note").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_public_note_removes_copy() {
        let storage = Memory::new();

        sync_public_note(&storage, &change(None, Some(snapshot("a", true)))).await;
        assert!(storage.find_public_note("note").await.unwrap().is_some());

        let action = sync_public_note(&storage, &change(Some(snapshot("a", true)), None)).await;
        assert_eq!(action, MirrorAction::Delete);
        assert!(storage.find_public_note("note").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_missing_copy_is_fine() {
        let storage = Memory::new();

        let other = PublicNote::from_snapshot("owner", "other", &snapshot("Other", true));
        storage.upsert_public_note(&other).await.unwrap();

        let action = sync_public_note(&storage, &change(Some(snapshot("a", true)), None)).await;
        assert_eq!(action, MirrorAction::Delete);

        // nothing else is touched
        assert_eq!(
            storage.find_public_note("other").await.unwrap(),
            Some(other)
        );
    }

    #[tokio::test]
    async fn test_redelivered_publish_is_idempotent() {
        let storage = Memory::new();
        let publish = change(Some(snapshot("a", false)), Some(snapshot("a", true)));

        sync_public_note(&storage, &publish).await;
        let first = storage.find_public_note("note").await.unwrap().unwrap();

        sync_public_note(&storage, &publish).await;
        let second = storage.find_public_note("note").await.unwrap().unwrap();

        assert_eq!(first.title, second.title);
        assert_eq!(first.description, second.description);
    }
}

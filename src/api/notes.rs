use axum::Extension;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;

use crate::events::NoteWritten;
use crate::events::dispatch_note_written;
use crate::notes::Note;
use crate::notes::normalize_tags;
use crate::notes::normalize_title;
use crate::password::hash;
use crate::storage::CreateNoteValues;
use crate::storage::Storage;
use crate::storage::UpdateNoteValues;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::request::non_blank;
use super::request::parse_optional_url;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteResponse {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_public: bool,
    pub password_protected: bool,
    pub created_at: NaiveDateTime,
    pub last_modified: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_read_at: Option<NaiveDateTime>,
}

impl NoteResponse {
    fn from_note(note: Note) -> Self {
        Self {
            password_protected: note.public_password.is_some(),
            id: note.id,
            title: note.title,
            tags: note.tags,
            description: note.description,
            image_url: note.image_url,
            is_public: note.is_public,
            created_at: note.created_at,
            last_modified: note.last_modified,
            last_read_at: None,
        }
    }

    fn from_note_multiple(mut notes: Vec<Note>) -> Vec<Self> {
        notes.drain(..).map(Self::from_note).collect::<Vec<Self>>()
    }
}

pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
) -> Result<Success<Vec<NoteResponse>>, Error> {
    let notes = storage
        .find_all_notes_by_owner(&current_user)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(NoteResponse::from_note_multiple(notes)))
}

pub async fn single<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    PathParameters(note_id): PathParameters<String>,
) -> Result<Success<NoteResponse>, Error> {
    let note = get_note(&storage, &current_user, &note_id).await?;

    let read_status = storage
        .find_read_status(&current_user, &note.id)
        .await
        .map_err(Error::internal_server_error)?;

    let mut response = NoteResponse::from_note(note);
    response.last_read_at = read_status.map(|read_status| read_status.last_read_at);

    Ok(Success::ok(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    tags: Vec<String>,
    description: Option<String>,
    image_url: Option<String>,
    #[serde(default)]
    is_public: bool,
    public_password: Option<String>,
}

pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    Form(form): Form<CreateNoteForm>,
) -> Result<Success<NoteResponse>, Error> {
    let title = normalize_title(&form.title);
    let tags = normalize_tags(&form.tags);
    let image_url = parse_optional_url(non_blank(form.image_url.as_deref()))?;
    let public_password = hash_password(non_blank(form.public_password.as_deref()))?;

    let values = CreateNoteValues {
        title: &title,
        tags: &tags,
        description: non_blank(form.description.as_deref()),
        image_url: image_url.as_deref(),
        is_public: form.is_public,
        public_password: public_password.as_deref(),
    };

    let note = storage
        .create_note(&current_user, &values)
        .await
        .map_err(Error::internal_server_error)?;

    tracing::debug!("Created note {}", note.path());

    let change = NoteWritten {
        owner_id: note.owner_id.clone(),
        note_id: note.id.clone(),
        before: None,
        after: Some(note.snapshot()),
    };

    dispatch_note_written(&storage, &change).await;

    Ok(Success::created(NoteResponse::from_note(note)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteForm {
    title: Option<String>,
    tags: Option<Vec<String>>,
    description: Option<String>,
    image_url: Option<String>,
    is_public: Option<bool>,
    public_password: Option<String>,
}

pub async fn update<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    PathParameters(note_id): PathParameters<String>,
    Form(form): Form<UpdateNoteForm>,
) -> Result<Success<NoteResponse>, Error> {
    let note = get_note(&storage, &current_user, &note_id).await?;

    let title = form.title.as_deref().map(normalize_title);
    let tags = form.tags.as_deref().map(normalize_tags);

    // an empty string clears the field
    let image_url = form
        .image_url
        .as_deref()
        .map(|image_url| parse_optional_url(non_blank(Some(image_url))))
        .transpose()?;
    let public_password = form
        .public_password
        .as_deref()
        .map(|password| hash_password(non_blank(Some(password))))
        .transpose()?;

    let values = UpdateNoteValues {
        title: title.as_deref(),
        tags: tags.as_deref(),
        description: form
            .description
            .as_deref()
            .map(|description| non_blank(Some(description))),
        image_url: image_url.as_ref().map(Option::as_deref),
        is_public: form.is_public,
        public_password: public_password.as_ref().map(Option::as_deref),
    };

    let Some(updated_note) = storage
        .update_note(&note, &values)
        .await
        .map_err(Error::internal_server_error)?
    else {
        tracing::debug!("Note {} is gone, nothing to update", note.path());

        return Err(Error::not_found("Note not found"));
    };

    tracing::debug!("Updated note {}", updated_note.path());

    let change = NoteWritten {
        owner_id: updated_note.owner_id.clone(),
        note_id: updated_note.id.clone(),
        before: Some(note.snapshot()),
        after: Some(updated_note.snapshot()),
    };

    dispatch_note_written(&storage, &change).await;

    Ok(Success::ok(NoteResponse::from_note(updated_note)))
}

pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    PathParameters(note_id): PathParameters<String>,
) -> Result<Success<&'static str>, Error> {
    let note = get_note(&storage, &current_user, &note_id).await?;

    storage
        .delete_note(&note)
        .await
        .map_err(Error::internal_server_error)?;

    tracing::debug!("Deleted note {}", note.path());

    let change = NoteWritten {
        owner_id: note.owner_id.clone(),
        note_id: note.id.clone(),
        before: Some(note.snapshot()),
        after: None,
    };

    dispatch_note_written(&storage, &change).await;

    Ok(Success::<&'static str>::no_content())
}

/// Fetch a note of the current owner
pub async fn get_note<S: Storage>(storage: &S, owner_id: &str, note_id: &str) -> Result<Note, Error> {
    storage
        .find_single_note_by_id(owner_id, note_id)
        .await
        .map_err(Error::internal_server_error)?
        .map_or_else(|| Err(Error::not_found("Note not found")), Ok)
}

fn hash_password(password: Option<&str>) -> Result<Option<String>, Error> {
    password
        .map(|password| {
            hash(password).ok_or_else(|| Error::internal_server_error("Could not hash password"))
        })
        .transpose()
}

//! Callable functions
//!
//! Invoked by the clients as remote procedures, always on behalf of the current owner

use axum::Extension;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::access_logs::READ_ACCESS;
use crate::client_ip::ClientIp;
use crate::storage::CreateAccessLogValues;
use crate::storage::Storage;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::Success;
use super::request::non_blank;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogAccessResponse {
    pub status: &'static str,
    pub log_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogAccessForm {
    note_id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    location: Option<String>,
    client_info: Option<Value>,
}

/// Log an access to a note, a `read` also marks the note as read
pub async fn log_access<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    client_ip: Option<ClientIp>,
    Form(form): Form<LogAccessForm>,
) -> Result<Success<LogAccessResponse>, Error> {
    let (Some(note_id), Some(kind)) = (
        non_blank(form.note_id.as_deref()),
        non_blank(form.kind.as_deref()),
    ) else {
        return Err(Error::bad_request("Missing noteId or type"));
    };

    let server_ip = client_ip.map(|client_ip| client_ip.ip_address);

    let values = CreateAccessLogValues {
        owner_id: &current_user,
        note_id,
        kind,
        location: non_blank(form.location.as_deref()),
        client_info: form.client_info.as_ref(),
        server_ip: server_ip.as_ref(),
    };

    let access_log = storage.create_access_log(&values).await.map_err(|err| {
        tracing::error!("Could not write access log: {err}");
        Error::internal_server_error("Failed to log access.").with_description(&err)
    })?;

    tracing::info!(
        "Access log {} written for user {}, note {note_id}",
        access_log.id,
        &*current_user
    );

    if kind == READ_ACCESS {
        storage
            .save_read_status(&current_user, note_id, Utc::now().naive_utc())
            .await
            .map_err(|err| {
                tracing::error!("Could not update read status: {err}");
                Error::internal_server_error("Failed to log access.").with_description(&err)
            })?;

        tracing::info!(
            "Read status updated for user {}, note {note_id}",
            &*current_user
        );
    }

    Ok(Success::ok(LogAccessResponse {
        status: "success",
        log_id: access_log.id,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateUserDataForm {
    anonymous_uid: Option<String>,
}

/// Move the data of an anonymous account to the current owner
#[allow(clippy::unused_async)]
pub async fn migrate_user_data(
    current_user: CurrentUser,
    Form(form): Form<MigrateUserDataForm>,
) -> Result<Success<&'static str>, Error> {
    let Some(anonymous_uid) = non_blank(form.anonymous_uid.as_deref()) else {
        return Err(Error::bad_request("Missing anonymousUid"));
    };

    tracing::info!(
        "Migration of user {anonymous_uid} to user {} requested",
        &*current_user
    );

    Err(Error::not_implemented("Data migration is not implemented"))
}

/// Export all data of the current owner
#[allow(clippy::unused_async)]
pub async fn export_user_data(current_user: CurrentUser) -> Result<Success<&'static str>, Error> {
    tracing::info!("Export of user {} requested", &*current_user);

    Err(Error::not_implemented("Data export is not implemented"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportUserDataForm {
    import_file_path: Option<String>,
}

/// Import data into the current owner from a stored file
#[allow(clippy::unused_async)]
pub async fn import_user_data(
    current_user: CurrentUser,
    Form(form): Form<ImportUserDataForm>,
) -> Result<Success<&'static str>, Error> {
    let Some(import_file_path) = non_blank(form.import_file_path.as_deref()) else {
        return Err(Error::bad_request("Missing importFilePath"));
    };

    tracing::info!(
        "Import for user {} from {import_file_path} requested",
        &*current_user
    );

    Err(Error::not_implemented("Data import is not implemented"))
}

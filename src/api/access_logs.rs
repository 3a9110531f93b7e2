use std::net::IpAddr;

use axum::Extension;
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::access_logs::AccessLog;
use crate::storage::Storage;

use super::CurrentUser;
use super::Error;
use super::PathParameters;
use super::Success;
use super::notes::get_note;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogResponse {
    pub id: Uuid,
    pub note_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: Option<String>,
    pub client_info: Option<Value>,
    pub server_ip: Option<IpAddr>,
    pub created_at: NaiveDateTime,
}

impl AccessLogResponse {
    fn from_access_log(access_log: AccessLog) -> Self {
        Self {
            id: access_log.id,
            note_id: access_log.note_id,
            kind: access_log.kind,
            location: access_log.location,
            client_info: access_log.client_info,
            server_ip: access_log.server_ip,
            created_at: access_log.created_at,
        }
    }
}

pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    PathParameters(note_id): PathParameters<String>,
) -> Result<Success<Vec<AccessLogResponse>>, Error> {
    let note = get_note(&storage, &current_user, &note_id).await?;

    let access_logs = storage
        .find_all_access_logs_by_note(&current_user, &note.id)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(
        access_logs
            .into_iter()
            .map(AccessLogResponse::from_access_log)
            .collect(),
    ))
}

use axum::Extension;
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::statistics::Statistics;
use crate::storage::Storage;

use super::CurrentUser;
use super::Error;
use super::Success;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResponse {
    pub note_count: u64,
    pub image_count: u64,
    pub total_image_size: u64,
    pub last_updated: Option<NaiveDateTime>,
}

impl StatisticsResponse {
    fn from_statistics(statistics: &Statistics) -> Self {
        Self {
            note_count: statistics.note_count(),
            image_count: statistics.image_count(),
            total_image_size: statistics.total_image_size(),
            last_updated: statistics.last_updated,
        }
    }
}

/// Statistics summary of the current owner, zeros when nothing happened yet
pub async fn single<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
) -> Result<Success<StatisticsResponse>, Error> {
    let statistics = storage
        .find_statistics(&current_user)
        .await
        .map_err(Error::internal_server_error)?
        .unwrap_or_default();

    Ok(Success::ok(StatisticsResponse::from_statistics(&statistics)))
}

//! All API endpoint setup

use axum::Router;
use axum::routing::get;
use axum::routing::post;

pub use current_user::CurrentUser;
pub use current_user::JwtKeys;
pub use event_source::EventSource;
pub use event_source::EventsSecret;
pub use request::Form;
pub use request::PathParameters;
pub use response::Error;
pub use response::Success;

use crate::storage::Storage;

mod access_logs;
mod calls;
mod current_user;
mod event_source;
mod events;
mod notes;
mod request;
mod response;
mod statistics;

/// Get the Axum router for all owner facing API routes
pub fn router<S: Storage>() -> Router {
    let notes = Router::new()
        .route("/", get(notes::list::<S>).post(notes::create::<S>))
        .route(
            "/{note}",
            get(notes::single::<S>)
                .patch(notes::update::<S>)
                .delete(notes::delete::<S>),
        )
        .route("/{note}/access-logs", get(access_logs::list::<S>));

    Router::new()
        .nest("/notes", notes)
        .route("/statistics", get(statistics::single::<S>))
        .route("/logAccess", post(calls::log_access::<S>))
        .route("/migrateUserData", post(calls::migrate_user_data))
        .route("/exportUserData", post(calls::export_user_data))
        .route("/importUserData", post(calls::import_user_data))
}

/// Get the Axum router for the event delivery routes
pub fn events_router<S: Storage>() -> Router {
    Router::new()
        .route("/notes", post(events::note_written::<S>))
        .route("/objects/finalize", post(events::object_finalized::<S>))
        .route("/objects/delete", post(events::object_deleted::<S>))
}

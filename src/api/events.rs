//! Event delivery endpoints
//!
//! Once an event is accepted the answer is always a success, even when a handler could
//! not update its record: failing would only make the event system redeliver the same
//! event over and over.

use axum::Extension;
use serde::Deserialize;

use crate::events::EventLedger;
use crate::events::NoteWritten;
use crate::events::StoredObject;
use crate::events::dispatch_note_written;
use crate::statistics::record_object_deleted;
use crate::statistics::record_object_finalized;
use crate::storage::Storage;

use super::Error;
use super::EventSource;
use super::Form;
use super::Success;

/// A delivered event, with the ID the event system gave it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery<E> {
    event_id: Option<String>,
    #[serde(flatten)]
    event: E,
}

impl<E> Delivery<E> {
    /// Unpack the event, `None` when it was delivered before
    async fn first_delivery(self, ledger: &EventLedger, stream: &str) -> Option<E> {
        if let Some(event_id) = self.event_id.as_deref() {
            if !ledger.first_delivery(stream, event_id).await {
                tracing::debug!("Skipping redelivered {stream} event {event_id}");

                return None;
            }
        }

        Some(self.event)
    }
}

pub async fn note_written<S: Storage>(
    _source: EventSource,
    Extension(storage): Extension<S>,
    Extension(ledger): Extension<EventLedger>,
    Form(delivery): Form<Delivery<NoteWritten>>,
) -> Result<Success<&'static str>, Error> {
    if delivery.event.owner_id.trim().is_empty() || delivery.event.note_id.trim().is_empty() {
        return Err(Error::bad_request("Missing ownerId or noteId"));
    }

    if let Some(change) = delivery.first_delivery(&ledger, "notes").await {
        dispatch_note_written(&storage, &change).await;
    }

    Ok(Success::<&'static str>::no_content())
}

pub async fn object_finalized<S: Storage>(
    _source: EventSource,
    Extension(storage): Extension<S>,
    Extension(ledger): Extension<EventLedger>,
    Form(delivery): Form<Delivery<StoredObject>>,
) -> Result<Success<&'static str>, Error> {
    validate_object(&delivery.event)?;

    if let Some(object) = delivery.first_delivery(&ledger, "objects.finalize").await {
        record_object_finalized(&storage, &object).await;
    }

    Ok(Success::<&'static str>::no_content())
}

pub async fn object_deleted<S: Storage>(
    _source: EventSource,
    Extension(storage): Extension<S>,
    Extension(ledger): Extension<EventLedger>,
    Form(delivery): Form<Delivery<StoredObject>>,
) -> Result<Success<&'static str>, Error> {
    validate_object(&delivery.event)?;

    // finalize and delete of the same object are different events
    if let Some(object) = delivery.first_delivery(&ledger, "objects.delete").await {
        record_object_deleted(&storage, &object).await;
    }

    Ok(Success::<&'static str>::no_content())
}

fn validate_object(object: &StoredObject) -> Result<(), Error> {
    if object.name.trim().is_empty() {
        return Err(Error::bad_request("Missing object name"));
    }

    Ok(())
}

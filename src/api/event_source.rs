//! Event source service
//!
//! The event system authenticates its deliveries with a shared secret as bearer token

use std::sync::Arc;

use axum::Extension;
use axum::RequestPartsExt;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

use crate::api::Error;

/// The secret shared with the event system
#[derive(Clone)]
pub struct EventsSecret {
    secret: Arc<str>,
}

impl EventsSecret {
    /// Wrap the shared secret
    pub fn new(secret: String) -> Self {
        Self {
            secret: Arc::from(secret),
        }
    }

    /// Compare without bailing out on the first difference
    fn matches(&self, token: &str) -> bool {
        let secret = self.secret.as_bytes();
        let token = token.as_bytes();

        if secret.len() != token.len() {
            return false;
        }

        secret
            .iter()
            .zip(token)
            .fold(0, |difference, (a, b)| difference | (a ^ b))
            == 0
    }
}

/// Proof that a request was sent by the event system
pub struct EventSource;

impl<B> FromRequestParts<B> for EventSource
where
    B: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &B) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| Error::unauthorized("Missing events secret"))?;

        let Extension(events_secret) = parts
            .extract::<Extension<EventsSecret>>()
            .await
            .map_err(|_| Error::internal_server_error("Could not get events secret"))?;

        if events_secret.matches(bearer.token()) {
            Ok(EventSource)
        } else {
            Err(Error::unauthorized("Invalid events secret"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        let events_secret = EventsSecret::new("verysecret".to_string());

        assert!(events_secret.matches("verysecret"));
        assert!(!events_secret.matches("verysecreT"));
        assert!(!events_secret.matches("verysecret!"));
        assert!(!events_secret.matches(""));
    }
}

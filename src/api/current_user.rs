//! Current user service
//!
//! Get the current owner from the request based on the Authorization header. Tokens are
//! issued by the authentication provider, this service only verifies them.

use std::ops::Deref;
use std::sync::Arc;

use axum::Extension;
use axum::RequestPartsExt;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;

use crate::api::Error;

/// The key used for decoding JWT tokens
#[derive(Clone)]
pub struct JwtKeys {
    /// The decoding key
    decoding: DecodingKey,
}

impl JwtKeys {
    /// Create a new decoding key, derived from a secret
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// The JWT claims to identify an owner
#[derive(Debug, Deserialize)]
struct Claims {
    /// The owner ID
    sub: String,
}

/// Current user service
#[derive(Clone, Debug)]
pub struct CurrentUser {
    /// ID of the owner behind the token
    owner_id: Arc<str>,
}

impl Deref for CurrentUser {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.owner_id
    }
}

impl<B> FromRequestParts<B> for CurrentUser
where
    B: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &B) -> Result<Self, Self::Rejection> {
        use jsonwebtoken::Validation;
        use jsonwebtoken::decode;

        // Extract the token from the authorization header
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| Error::unauthorized("Missing API token"))?;

        let Extension(jwt_keys) = parts
            .extract::<Extension<JwtKeys>>()
            .await
            .map_err(|_| Error::internal_server_error("Could not get JWT keys"))?;

        // expiration is validated by default
        let validation = Validation::default();

        let token_data = decode::<Claims>(bearer.token(), &jwt_keys.decoding, &validation)
            .map_err(|err| Error::unauthorized(format!("Invalid token: {err}")))?;

        let owner_id = token_data.claims.sub;

        if owner_id.trim().is_empty() {
            return Err(Error::unauthorized("Invalid token: missing subject"));
        }

        Ok(CurrentUser {
            owner_id: Arc::from(owner_id),
        })
    }
}

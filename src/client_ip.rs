//! Optional client IP address extractor
//!
//! Requests without a known peer address (like requests from tests) simply have none

use std::convert::Infallible;
use std::net::IpAddr;

use axum::extract::FromRequestParts as _;
use axum::extract::OptionalFromRequestParts;
use axum::http::request::Parts;

/// IP address of the client, as seen by the server
#[derive(Debug, Clone, Copy)]
pub struct ClientIp {
    pub ip_address: IpAddr,
}

impl<S> OptionalFromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let client_ip = axum_client_ip::ClientIp::from_request_parts(parts, state).await;

        Ok(client_ip.ok().map(|axum_client_ip::ClientIp(ip_address)| Self { ip_address }))
    }
}

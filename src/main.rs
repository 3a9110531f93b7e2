#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
// easier to use when using the functions as callback of foreign functions
#![allow(clippy::needless_pass_by_value)]

use std::net::SocketAddr;

use anyhow::Result;
use axum::Extension;
use axum::Router;
use axum_client_ip::ClientIpSource;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use crate::api::EventsSecret;
use crate::api::JwtKeys;
use crate::config::Config;
use crate::events::EventLedger;
use crate::storage::Storage;
use crate::utils::env_var_or_else;

mod access_logs;
mod api;
mod client_ip;
mod config;
mod events;
mod graceful_shutdown;
mod mirror;
mod notes;
mod password;
mod statistics;
mod storage;
#[cfg(test)]
mod tests;
mod utils;
mod viewer;

const DEFAULT_RUST_LOG: &str = "notesync=debug,tower_http=debug";
const DEFAULT_ADDRESS: &str = "0.0.0.0:6000";

#[tokio::main]
async fn main() -> Result<()> {
    setup_environment();
    setup_tracing();

    let storage = storage::setup().await?;
    let app = setup_app(storage, Config::from_env());

    let address = setup_address()?;
    tracing::info!("Listening on {}", address);

    let listener = TcpListener::bind(&address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown::handler())
    .await?;

    Ok(())
}

/// Create the app around a storage
///
/// Everything the handlers need is injected as an extension
pub fn setup_app<S: Storage>(storage: S, config: Config) -> Router {
    let jwt_keys = JwtKeys::new(config.jwt_secret.as_bytes());
    let events_secret = EventsSecret::new(config.events_secret);
    let ledger = EventLedger::new();

    Router::new()
        .nest("/api", api::router::<S>())
        .nest("/events", api::events_router::<S>())
        .merge(viewer::router::<S>())
        .layer(TraceLayer::new_for_http())
        .layer(ClientIpSource::ConnectInfo.into_extension())
        .layer(Extension(storage))
        .layer(Extension(jwt_keys))
        .layer(Extension(events_secret))
        .layer(Extension(ledger))
        .layer(Extension(config.viewer))
}

fn setup_environment() {
    dotenvy::dotenv().ok();
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::registry;

    registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_RUST_LOG.into()),
        ))
        .with(fmt::layer())
        .init();
}

fn setup_address() -> Result<SocketAddr> {
    let mut address =
        env_var_or_else("ADDRESS", || String::from(DEFAULT_ADDRESS)).parse::<SocketAddr>()?;

    // optional override of just the port
    if let Ok(port) = std::env::var("PORT") {
        // only check non-empty strings
        if !port.is_empty() {
            let port = port.parse::<u16>()?;

            address.set_port(port);
        }
    }

    Ok(address)
}

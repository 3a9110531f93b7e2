//! Runtime configuration
//!
//! Read once from the environment on startup, tests build it directly

use crate::password::generate;
use crate::utils::env_var_or_else;

const DEFAULT_APP_DOMAIN: &str = "localhost";
const DEFAULT_APP_URL_SCHEME: &str = "mynoteapp";

/// Configuration of the whole app
#[derive(Clone, Debug)]
pub struct Config {
    /// Secret to verify owner tokens with
    pub jwt_secret: String,

    /// Secret the event system uses to deliver events
    pub events_secret: String,

    /// Settings for the public note pages
    pub viewer: ViewerConfig,
}

/// Settings for the public note pages
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    /// Domain the public pages and the web app are served from
    pub app_domain: String,

    /// Custom URI scheme of the companion app, without `://`
    pub app_url_scheme: String,

    /// Where iOS users without the app are sent
    pub app_store_link: Option<String>,

    /// Where Android users without the app are sent
    pub play_store_link: Option<String>,
}

impl Config {
    /// Detect the configuration from the environment
    ///
    /// Missing secrets are generated, they will not survive a restart
    pub fn from_env() -> Self {
        let jwt_secret = env_var_or_else("JWT_SECRET", || {
            let jwt_secret = generate();
            tracing::info!("`JWT_SECRET` is not set, generating temporary one: {jwt_secret}");
            jwt_secret
        });

        let events_secret = env_var_or_else("EVENTS_SECRET", || {
            let events_secret = generate();
            tracing::info!(
                "`EVENTS_SECRET` is not set, generating temporary one: {events_secret}"
            );
            events_secret
        });

        Self {
            jwt_secret,
            events_secret,
            viewer: ViewerConfig::from_env(),
        }
    }
}

impl ViewerConfig {
    fn from_env() -> Self {
        Self {
            app_domain: env_var_or_else("APP_DOMAIN", || String::from(DEFAULT_APP_DOMAIN)),
            app_url_scheme: env_var_or_else("APP_URL_SCHEME", || {
                String::from(DEFAULT_APP_URL_SCHEME)
            }),
            app_store_link: optional_env_var("APP_STORE_LINK"),
            play_store_link: optional_env_var("PLAY_STORE_LINK"),
        }
    }
}

fn optional_env_var(var_name: &'static str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .filter(|value| !value.is_empty())
}
